//! String conversion for values stored in attributes.

use std::fmt::Display;
use std::marker::PhantomData;
use std::str::FromStr;

pub trait Serializer<T> {
    fn to_string(&self, value: &T) -> String;

    /// `None` when the text does not hold a `T`.
    fn from_string(&self, text: &str) -> Option<T>;
}

/// Uses `Display` and `FromStr`. Covers strings, integers and booleans.
pub struct TextSerializer<T>(PhantomData<fn() -> T>);

impl<T> TextSerializer<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for TextSerializer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for TextSerializer<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T: FromStr + Display> Serializer<T> for TextSerializer<T> {
    fn to_string(&self, value: &T) -> String {
        value.to_string()
    }

    fn from_string(&self, text: &str) -> Option<T> {
        text.parse().ok()
    }
}

/// The only key of a single-valued collection. Never written.
pub(crate) struct UnitSerializer;

impl Serializer<()> for UnitSerializer {
    fn to_string(&self, _value: &()) -> String {
        String::new()
    }

    fn from_string(&self, _text: &str) -> Option<()> {
        Some(())
    }
}
