//! Owned snapshot copies

use super::{VarData, Variable, VariableDescriptor};
use crate::Result;

/// A consistent, caller-owned copy of one completed buffer slot.
///
/// Every read produces a fresh copy; the bytes are never shared with the publisher
/// or with other readers and are immutable once copied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotCopy {
    data: Box<[u8]>,
    tick: i32,
    slot: usize,
}

impl SnapshotCopy {
    /// Wrap copied payload bytes.
    pub fn new(data: impl Into<Box<[u8]>>, tick: i32, slot: usize) -> Self {
        Self { data: data.into(), tick, slot }
    }

    /// Raw payload bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Tick counter observed unchanged across the copy.
    pub fn tick(&self) -> i32 {
        self.tick
    }

    /// Index of the buffer slot this copy came from.
    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Read the first element of a variable.
    pub fn read<T: VarData>(&self, descriptor: &VariableDescriptor) -> Result<T> {
        super::read(self, descriptor)
    }

    /// Read a single array element.
    pub fn read_index<T: VarData>(&self, descriptor: &VariableDescriptor, index: usize) -> Result<T> {
        super::read_index(self, descriptor, index)
    }

    /// Read every element of a variable.
    pub fn read_array<T: VarData>(&self, descriptor: &VariableDescriptor) -> Result<Vec<T>> {
        super::read_array(self, descriptor)
    }

    /// Read through a pre-validated typed handle.
    pub fn get<T: VarData>(&self, variable: &Variable<T>) -> Result<T> {
        variable.read(self)
    }

    /// Consume the copy, returning its bytes.
    pub fn into_bytes(self) -> Box<[u8]> {
        self.data
    }
}
