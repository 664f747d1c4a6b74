// Copyright (c) The Fimo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed parameter cells with independent read/write visibility.

use parking_lot::Mutex;
use std::fmt;

/// The integer width of a parameter's value.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ParamType {
    /// `i8`.
    I8,
    /// `i16`.
    I16,
    /// `i32`.
    I32,
    /// `i64`.
    I64,
    /// `u8`.
    U8,
    /// `u16`.
    U16,
    /// `u32`.
    U32,
    /// `u64`.
    U64,
}

/// A parameter's value, tagged with its width.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ParamValue {
    /// `i8`.
    I8(i8),
    /// `i16`.
    I16(i16),
    /// `i32`.
    I32(i32),
    /// `i64`.
    I64(i64),
    /// `u8`.
    U8(u8),
    /// `u16`.
    U16(u16),
    /// `u32`.
    U32(u32),
    /// `u64`.
    U64(u64),
}

impl ParamValue {
    /// The width of this value.
    pub fn ty(&self) -> ParamType {
        match self {
            ParamValue::I8(_) => ParamType::I8,
            ParamValue::I16(_) => ParamType::I16,
            ParamValue::I32(_) => ParamType::I32,
            ParamValue::I64(_) => ParamType::I64,
            ParamValue::U8(_) => ParamType::U8,
            ParamValue::U16(_) => ParamType::U16,
            ParamValue::U32(_) => ParamType::U32,
            ParamValue::U64(_) => ParamType::U64,
        }
    }
}

/// Read/write visibility of a parameter, independently settable for reads and writes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Access {
    /// Only the owning module (via the unchecked `_inner` accessors) may use this operation.
    Private,
    /// Any module with a live dependency edge onto the owner may use this operation.
    Dependency,
    /// Any caller may use this operation.
    Public,
}

/// One named, typed, access-controlled parameter cell belonging to a module.
pub struct Parameter {
    ty: ParamType,
    read_access: Access,
    write_access: Access,
    value: Mutex<ParamValue>,
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameter")
            .field("ty", &self.ty)
            .field("read_access", &self.read_access)
            .field("write_access", &self.write_access)
            .finish_non_exhaustive()
    }
}

impl Parameter {
    /// Creates a new parameter cell. Panics if `default`'s width disagrees with `ty` — this is a
    /// manifest-authoring error, not a runtime condition callers need to recover from.
    pub fn new(ty: ParamType, default: ParamValue, read_access: Access, write_access: Access) -> Self {
        assert_eq!(ty, default.ty(), "parameter default does not match its declared type");
        Self { ty, read_access, write_access, value: Mutex::new(default) }
    }

    /// The parameter's declared type.
    pub fn ty(&self) -> ParamType {
        self.ty
    }

    /// The visibility required to read this parameter.
    pub fn read_access(&self) -> Access {
        self.read_access
    }

    /// The visibility required to write this parameter.
    pub fn write_access(&self) -> Access {
        self.write_access
    }

    /// Reads the current value, bypassing visibility checks. Used by the registry's `_inner`
    /// accessors and by the public accessors after they have checked visibility themselves.
    pub(crate) fn get_inner(&self) -> ParamValue {
        *self.value.lock()
    }

    /// Writes a new value, bypassing visibility checks. Fails with [`crate::Error::Invalid`] if
    /// `value`'s width disagrees with this parameter's declared type.
    pub(crate) fn set_inner(&self, value: ParamValue) -> crate::Result<()> {
        if value.ty() != self.ty {
            return Err(crate::Error::Invalid(format!(
                "parameter type mismatch: expected {:?}, got {:?}",
                self.ty,
                value.ty()
            )));
        }
        *self.value.lock() = value;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inner_accessors_round_trip() {
        let p = Parameter::new(ParamType::U32, ParamValue::U32(7), Access::Public, Access::Private);
        assert_eq!(p.get_inner(), ParamValue::U32(7));
        p.set_inner(ParamValue::U32(9)).unwrap();
        assert_eq!(p.get_inner(), ParamValue::U32(9));
    }

    #[test]
    fn set_inner_rejects_width_mismatch() {
        let p = Parameter::new(ParamType::U32, ParamValue::U32(7), Access::Public, Access::Private);
        assert!(p.set_inner(ParamValue::U8(1)).is_err());
    }
}
