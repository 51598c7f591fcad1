//! Storage cells: where a realm's value actually lives.
//!
//! A root realm owns a [`RootCell`]. Nested realms read and write a
//! [`SliceCell`] that addresses one fragment inside the parent's cell; writes
//! rebuild each aggregate level up to the root, so the root slot is the only
//! place that is ever assigned.

use std::cell::RefCell;
use std::rc::Rc;

use crate::core::error::StructuralError;
use crate::core::path::Fragment;
use crate::core::value::Value;

pub trait StorageCell {
    fn get(&self) -> Value;
    fn set(&self, value: Value) -> Result<(), StructuralError>;
}

/// Cell owning a value slot.
#[derive(Debug, Default)]
pub struct RootCell {
    slot: RefCell<Value>,
}

impl RootCell {
    pub fn new(value: Value) -> Self {
        Self {
            slot: RefCell::new(value),
        }
    }
}

impl StorageCell for RootCell {
    fn get(&self) -> Value {
        self.slot.borrow().clone()
    }

    fn set(&self, value: Value) -> Result<(), StructuralError> {
        *self.slot.borrow_mut() = value;
        Ok(())
    }
}

/// Cell addressing `fragment` inside a parent cell.
pub struct SliceCell {
    parent: Rc<dyn StorageCell>,
    fragment: Fragment,
}

impl SliceCell {
    pub fn new(parent: Rc<dyn StorageCell>, fragment: Fragment) -> Self {
        Self { parent, fragment }
    }
}

impl StorageCell for SliceCell {
    fn get(&self) -> Value {
        self.parent.get().child(&self.fragment)
    }

    fn set(&self, value: Value) -> Result<(), StructuralError> {
        let next = self.parent.get().with_child(&self.fragment, value)?;
        self.parent.set(next)
    }
}
