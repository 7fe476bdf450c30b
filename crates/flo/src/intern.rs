//! The tables in which the entries of an object are interned.

use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

use crate::{poison::Poisonable, types::PoisonType};

/// The type of the ids of every table.
pub(crate) type InternIdentifier = usize;

/// A table of entries, each referred to by the id it was assigned on
/// insertion.
///
/// Ids are assigned densely, in insertion order, starting from one. The slot
/// at id zero always holds a [`PoisonType::NullInternedValue`].
#[derive(Clone, Serialize, Deserialize, Debug)]
#[serde(bound(
    serialize = "ValueType: Serialize",
    deserialize = "ValueType: Deserialize<'de>"
))]
pub struct InternTable<IdType, ValueType>
where
    IdType: From<usize> + Into<usize> + Copy,
    ValueType: Poisonable + Clone,
{
    entries: Vec<ValueType>,

    #[serde(skip)]
    _id: PhantomData<IdType>,
}

impl<IdType, ValueType> InternTable<IdType, ValueType>
where
    IdType: From<usize> + Into<usize> + Copy,
    ValueType: Poisonable + Clone,
{
    /// Creates a table holding only the null entry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: vec![ValueType::poisoned(PoisonType::NullInternedValue)],
            _id:     PhantomData,
        }
    }

    /// Adds `value` to the table, returning its id.
    pub fn insert(&mut self, value: &ValueType) -> IdType {
        self.entries.push(value.clone());
        (self.entries.len() - 1).into()
    }

    /// Reserves an id for an entry that is not yet known, holding an entry
    /// poisoned with `typ` until it is filled by [`Self::swap`].
    pub fn reserve(&mut self, typ: PoisonType) -> IdType {
        self.insert(&ValueType::poisoned(typ))
    }

    /// Gets a copy of the entry with the provided `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not assigned by this table.
    pub fn get(&self, id: IdType) -> ValueType {
        let index: usize = id.into();
        self.entries
            .get(index)
            .unwrap_or_else(|| panic!("intern table has no entry {index}"))
            .clone()
    }

    /// Replaces the entry with the provided `id` by `value`, returning the
    /// previous entry.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not assigned by this table.
    pub fn swap(&mut self, id: IdType, value: &ValueType) -> ValueType {
        let index: usize = id.into();
        let slot = self
            .entries
            .get_mut(index)
            .unwrap_or_else(|| panic!("intern table has no entry {index}"));
        std::mem::replace(slot, value.clone())
    }

    /// Gets the number of entries, not counting the null entry.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len() - 1
    }

    /// Returns `true` if nothing has been inserted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates over the entries in id order, skipping the null entry.
    pub fn iter(&self) -> impl Iterator<Item = (IdType, &ValueType)> {
        self.entries
            .iter()
            .enumerate()
            .skip(1)
            .map(|(index, value)| (index.into(), value))
    }
}

impl<IdType, ValueType> Default for InternTable<IdType, ValueType>
where
    IdType: From<usize> + Into<usize> + Copy,
    ValueType: Poisonable + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use crate::{
        intern::InternTable,
        poison::Poisonable,
        types::{Block, BlockId, PoisonType},
    };

    #[test]
    fn reserved_slots_can_be_filled_later() {
        let mut table: InternTable<BlockId, Block> = InternTable::new();
        let id = table.reserve(PoisonType::Undefined);
        assert!(Block::is_poisoned(&table.get(id)));

        let previous = table.swap(id, &Block::default());
        assert!(Block::is_poisoned(&previous));
        assert!(!Block::is_poisoned(&table.get(id)));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn ids_start_after_the_null_entry() {
        let mut table: InternTable<BlockId, Block> = InternTable::new();
        assert!(table.is_empty());
        assert_eq!(table.get(0).poison, PoisonType::NullInternedValue);

        let first = table.insert(&Block::default());
        let second = table.insert(&Block::default());
        assert_eq!((first, second), (1, 2));

        let ids: Vec<BlockId> = table.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![first, second]);
    }
}
