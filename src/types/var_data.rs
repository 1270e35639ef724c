//! Typed views over snapshot bytes.
//!
//! Every representation a variable may be read as implements [`VarData`], which pins it
//! to exactly one [`VariableType`]. The compatibility check is therefore a single
//! comparison against a constant, and [`Variable<T>`] moves it to the point where a
//! handle is bound rather than every read.
//!
//! | value type | size | representations |
//! |---|---|---|
//! | Byte | 1 | `u8` |
//! | Bool | 1 | `bool` |
//! | Int | 4 | `i32` |
//! | Bitfield | 4 | `u32`, [`BitField`] |
//! | Float | 4 | `f32` |
//! | Double | 8 | `f64` |
//!
//! Reads are pure little-endian reinterpretation; nothing is scaled or rounded.

use std::marker::PhantomData;

use super::{BitField, SnapshotCopy, VariableDescriptor, VariableType};
use crate::{Result, TelemetryError};

/// Trait for representations that can be decoded from snapshot bytes.
pub trait VarData: Sized + Copy {
    /// The single value type this representation is compatible with.
    const VALUE_TYPE: VariableType;

    /// Representation name used in diagnostics.
    const NAME: &'static str;

    /// Decode one element from exactly `VALUE_TYPE.size()` bytes.
    fn decode(bytes: &[u8]) -> Self;
}

fn le_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}

impl VarData for u8 {
    const VALUE_TYPE: VariableType = VariableType::Byte;
    const NAME: &'static str = "u8";

    fn decode(bytes: &[u8]) -> Self {
        bytes[0]
    }
}

impl VarData for bool {
    const VALUE_TYPE: VariableType = VariableType::Bool;
    const NAME: &'static str = "bool";

    fn decode(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }
}

impl VarData for i32 {
    const VALUE_TYPE: VariableType = VariableType::Int;
    const NAME: &'static str = "i32";

    fn decode(bytes: &[u8]) -> Self {
        i32::from_le_bytes(le_array(bytes))
    }
}

impl VarData for u32 {
    const VALUE_TYPE: VariableType = VariableType::Bitfield;
    const NAME: &'static str = "u32";

    fn decode(bytes: &[u8]) -> Self {
        u32::from_le_bytes(le_array(bytes))
    }
}

impl VarData for BitField {
    const VALUE_TYPE: VariableType = VariableType::Bitfield;
    const NAME: &'static str = "BitField";

    fn decode(bytes: &[u8]) -> Self {
        BitField(u32::from_le_bytes(le_array(bytes)))
    }
}

impl VarData for f32 {
    const VALUE_TYPE: VariableType = VariableType::Float;
    const NAME: &'static str = "f32";

    fn decode(bytes: &[u8]) -> Self {
        f32::from_le_bytes(le_array(bytes))
    }
}

impl VarData for f64 {
    const VALUE_TYPE: VariableType = VariableType::Double;
    const NAME: &'static str = "f64";

    fn decode(bytes: &[u8]) -> Self {
        f64::from_le_bytes(le_array(bytes))
    }
}

/// Whether `T` may be used to read a variable of type `value_type`.
pub fn is_compatible<T: VarData>(value_type: VariableType) -> bool {
    T::VALUE_TYPE == value_type
}

fn check_type<T: VarData>(descriptor: &VariableDescriptor) -> Result<()> {
    if is_compatible::<T>(descriptor.value_type) {
        Ok(())
    } else {
        Err(TelemetryError::type_mismatch(&descriptor.name, descriptor.value_type, T::NAME))
    }
}

fn element_bytes<'a>(
    snapshot: &'a SnapshotCopy,
    descriptor: &VariableDescriptor,
    index: usize,
) -> Result<&'a [u8]> {
    if index >= descriptor.value_count {
        return Err(TelemetryError::IndexOutOfRange {
            variable: descriptor.name.clone(),
            index,
            count: descriptor.value_count,
        });
    }

    let size = descriptor.value_type.size();
    let available = snapshot.len();
    let offset = index
        .checked_mul(size)
        .and_then(|delta| delta.checked_add(descriptor.byte_offset))
        .ok_or(TelemetryError::OutOfBounds { offset: descriptor.byte_offset, len: size, available })?;

    snapshot
        .bytes()
        .get(offset..offset.saturating_add(size))
        .ok_or(TelemetryError::OutOfBounds { offset, len: size, available })
}

/// Read the first element of `descriptor` from `snapshot`.
pub fn read<T: VarData>(snapshot: &SnapshotCopy, descriptor: &VariableDescriptor) -> Result<T> {
    read_index(snapshot, descriptor, 0)
}

/// Read element `index` of `descriptor` from `snapshot`.
pub fn read_index<T: VarData>(
    snapshot: &SnapshotCopy,
    descriptor: &VariableDescriptor,
    index: usize,
) -> Result<T> {
    check_type::<T>(descriptor)?;
    element_bytes(snapshot, descriptor, index).map(T::decode)
}

/// Read all `value_count` elements of `descriptor` from `snapshot`.
pub fn read_array<T: VarData>(
    snapshot: &SnapshotCopy,
    descriptor: &VariableDescriptor,
) -> Result<Vec<T>> {
    check_type::<T>(descriptor)?;

    let size = descriptor.value_type.size();
    let len = descriptor.byte_len();
    let offset = descriptor.byte_offset;
    let bytes = snapshot
        .bytes()
        .get(offset..offset.saturating_add(len))
        .ok_or_else(|| TelemetryError::OutOfBounds { offset, len, available: snapshot.len() })?;

    Ok(bytes.chunks_exact(size).map(T::decode).collect())
}

/// A variable handle whose representation was validated when it was bound.
///
/// Binding fails with `TypeMismatch` once, up front; reads through the handle only
/// check bounds and indices.
#[derive(Debug, Clone)]
pub struct Variable<T: VarData> {
    descriptor: VariableDescriptor,
    _marker: PhantomData<fn() -> T>,
}

impl<T: VarData> Variable<T> {
    /// Bind a descriptor to representation `T`.
    pub fn bind(descriptor: VariableDescriptor) -> Result<Self> {
        check_type::<T>(&descriptor)?;
        Ok(Self { descriptor, _marker: PhantomData })
    }

    pub fn descriptor(&self) -> &VariableDescriptor {
        &self.descriptor
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    /// Read the first element.
    pub fn read(&self, snapshot: &SnapshotCopy) -> Result<T> {
        self.read_index(snapshot, 0)
    }

    /// Read element `index`.
    pub fn read_index(&self, snapshot: &SnapshotCopy, index: usize) -> Result<T> {
        element_bytes(snapshot, &self.descriptor, index).map(T::decode)
    }

    /// Read every element.
    pub fn read_array(&self, snapshot: &SnapshotCopy) -> Result<Vec<T>> {
        read_array(snapshot, &self.descriptor)
    }
}
