//! Conversions between native Rust types and frame positions.
//!
//! `FromScript` reads one argument, `IntoReturn` turns a native return value
//! into what gets pushed. Both are what the `#[function]` macro generates
//! calls to, but they work just as well by hand:
//!
//! ```ignore
//! let a = f64::from_script(&frame, 0)?;
//! let b = f64::from_script(&frame, 1)?;
//! (a + b).into_return()
//! ```

use std::fmt::Display;

use crate::abi::ValueKind;
use crate::error::{AddonError, AddonResult};
use crate::frame::Frame;
use crate::function::FunctionRef;
use crate::value::ScriptValue;

/// Read a native argument from a frame position.
pub trait FromScript: Sized {
    /// Convert the value at `index`
    fn from_script(frame: &Frame, index: i32) -> AddonResult<Self>;
}

/// Convert a native return value into the value left on the stack.
///
/// `None` means the call has no script-visible result.
pub trait IntoReturn {
    /// Perform the conversion
    fn into_return(self) -> AddonResult<Option<ScriptValue>>;
}

fn expect_kind(frame: &Frame, index: i32, expected: ValueKind) -> AddonResult<()> {
    let got = frame.kind(index);
    if got == expected {
        Ok(())
    } else {
        Err(AddonError::ArgumentType {
            index,
            expected: expected.name(),
            got,
        })
    }
}

// ============================================================================
// FromScript
// ============================================================================

impl FromScript for f64 {
    fn from_script(frame: &Frame, index: i32) -> AddonResult<Self> {
        expect_kind(frame, index, ValueKind::Number)?;
        Ok(frame.get_number(index))
    }
}

impl FromScript for i32 {
    fn from_script(frame: &Frame, index: i32) -> AddonResult<Self> {
        let n = f64::from_script(frame, index)?;
        if n.fract() != 0.0 || n < i32::MIN as f64 || n > i32::MAX as f64 {
            return Err(AddonError::Argument(format!(
                "argument {index}: expected an integer, got {n}"
            )));
        }
        Ok(n as i32)
    }
}

impl FromScript for bool {
    fn from_script(frame: &Frame, index: i32) -> AddonResult<Self> {
        expect_kind(frame, index, ValueKind::Boolean)?;
        Ok(frame.get_bool(index))
    }
}

impl FromScript for String {
    fn from_script(frame: &Frame, index: i32) -> AddonResult<Self> {
        expect_kind(frame, index, ValueKind::String)?;
        frame.get_string(index)
    }
}

impl FromScript for ScriptValue {
    fn from_script(frame: &Frame, index: i32) -> AddonResult<Self> {
        frame.arg(index)
    }
}

impl FromScript for FunctionRef {
    fn from_script(frame: &Frame, index: i32) -> AddonResult<Self> {
        expect_kind(frame, index, ValueKind::Function)?;
        Ok(frame.capture(index))
    }
}

impl<T: FromScript> FromScript for Option<T> {
    fn from_script(frame: &Frame, index: i32) -> AddonResult<Self> {
        match frame.kind(index) {
            ValueKind::None | ValueKind::Undefined | ValueKind::Null => Ok(None),
            _ => T::from_script(frame, index).map(Some),
        }
    }
}

// ============================================================================
// IntoReturn
// ============================================================================

impl IntoReturn for () {
    fn into_return(self) -> AddonResult<Option<ScriptValue>> {
        Ok(None)
    }
}

impl IntoReturn for ScriptValue {
    fn into_return(self) -> AddonResult<Option<ScriptValue>> {
        Ok(Some(self))
    }
}

macro_rules! into_return_via_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoReturn for $ty {
                fn into_return(self) -> AddonResult<Option<ScriptValue>> {
                    Ok(Some(ScriptValue::from(self)))
                }
            }
        )*
    };
}

into_return_via_value!(f64, i32, bool, String, &str, Vec<f64>, Vec<String>);

impl IntoReturn for u32 {
    fn into_return(self) -> AddonResult<Option<ScriptValue>> {
        Ok(Some(ScriptValue::Number(self as f64)))
    }
}

impl<T: IntoReturn> IntoReturn for Option<T> {
    fn into_return(self) -> AddonResult<Option<ScriptValue>> {
        match self {
            Some(value) => value.into_return(),
            None => Ok(Some(ScriptValue::Null)),
        }
    }
}

impl<T: IntoReturn, E: Display> IntoReturn for Result<T, E> {
    fn into_return(self) -> AddonResult<Option<ScriptValue>> {
        match self {
            Ok(value) => value.into_return(),
            Err(e) => Err(AddonError::Failed(e.to_string())),
        }
    }
}
