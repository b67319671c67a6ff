use crate::model::{Entity, EntityId, Ordered, ValidationError};
use crate::storage::{KeyedStore, StoreError, StoreKey};
use chrono::Utc;

#[derive(thiserror::Error, Debug)]
pub enum CollectionError {
    #[error("rejected: {0}")]
    Invalid(#[from] ValidationError),
    #[error("no record with id {0}")]
    NotFound(EntityId),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CollectionError {
    /// Validation failures and missing ids leave the collection untouched and
    /// are reported to the user as no-ops rather than failures.
    pub fn is_benign(&self) -> bool {
        matches!(
            self,
            CollectionError::Invalid(_) | CollectionError::NotFound(_)
        )
    }
}

/// An ordered list of records persisted as one JSON array under a store key.
///
/// Every successful mutation writes the whole list back before returning.
pub struct EntityCollection<T: Entity> {
    key: StoreKey,
    store: KeyedStore,
    items: Vec<T>,
}

impl<T: Entity> EntityCollection<T> {
    pub fn load(store: &KeyedStore, key: StoreKey) -> Self {
        let items = store.load_records(key);
        EntityCollection {
            key,
            store: store.clone(),
            items,
        }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: EntityId) -> Option<&T> {
        self.items.iter().find(|item| item.id() == id)
    }

    pub fn filter<'a, P>(&'a self, mut pred: P) -> impl Iterator<Item = &'a T> + 'a
    where
        P: FnMut(&T) -> bool + 'a,
    {
        self.items.iter().filter(move |item| pred(item))
    }

    /// Wall-clock milliseconds, bumped past every existing id so rapid
    /// creations never collide.
    pub fn next_id(&self) -> EntityId {
        let now = Utc::now().timestamp_millis();
        let floor = self
            .items
            .iter()
            .map(|item| item.id())
            .max()
            .map(|max| max + 1)
            .unwrap_or(now);
        now.max(floor)
    }

    pub fn add<F>(&mut self, build: F) -> Result<T, CollectionError>
    where
        F: FnOnce(EntityId) -> T,
    {
        let record = build(self.next_id());
        record.validate()?;
        self.items.push(record.clone());
        self.persist()?;
        tracing::debug!(key = self.key.suffix(), id = record.id(), "added");
        Ok(record)
    }

    pub fn update<F>(&mut self, id: EntityId, edit: F) -> Result<T, CollectionError>
    where
        F: FnOnce(&mut T),
    {
        let idx = self.position(id).ok_or(CollectionError::NotFound(id))?;
        let mut record = self.items[idx].clone();
        edit(&mut record);
        record.validate()?;
        self.items[idx] = record.clone();
        self.persist()?;
        Ok(record)
    }

    /// Returns `false` when nothing matched; that is not an error.
    pub fn remove(&mut self, id: EntityId) -> Result<bool, CollectionError> {
        let before = self.items.len();
        self.items.retain(|item| item.id() != id);
        if self.items.len() == before {
            return Ok(false);
        }
        self.persist()?;
        tracing::debug!(key = self.key.suffix(), id, "removed");
        Ok(true)
    }

    pub fn persist(&self) -> Result<(), CollectionError> {
        self.store.save(self.key, &self.items)?;
        Ok(())
    }

    fn position(&self, id: EntityId) -> Option<usize> {
        self.items.iter().position(|item| item.id() == id)
    }
}

impl<T: Ordered> EntityCollection<T> {
    /// Drops `id` onto `target_id`: the dragged record takes the target's
    /// index and every record's rank is rewritten to its new position.
    ///
    /// Returns `false` for a self-drop or unknown ids.
    pub fn reorder(&mut self, id: EntityId, target_id: EntityId) -> Result<bool, CollectionError> {
        if id == target_id {
            return Ok(false);
        }
        let (Some(from), Some(to)) = (self.position(id), self.position(target_id)) else {
            return Ok(false);
        };
        let dragged = self.items.remove(from);
        self.items.insert(to, dragged);
        self.renumber();
        self.persist()?;
        Ok(true)
    }

    /// Restores display order from the stored ranks, tolerating gaps or
    /// duplicates left by older data. Stable for equal ranks.
    pub fn sort_by_order(&mut self) {
        self.items.sort_by_key(|item| item.order());
    }

    fn renumber(&mut self) {
        for (idx, item) in self.items.iter_mut().enumerate() {
            item.set_order(idx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Habit, QuickTask, Task, TaskCategory, TaskStatus};
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn habits(store: &KeyedStore, names: &[&str]) -> EntityCollection<Habit> {
        let mut habits = EntityCollection::load(store, StoreKey::Habits);
        for name in names {
            let order = habits.len();
            habits
                .add(|id| Habit::new(id, name.to_string(), order))
                .expect("add habit");
        }
        habits
    }

    fn names(habits: &EntityCollection<Habit>) -> Vec<String> {
        habits.items().iter().map(|h| h.name.clone()).collect()
    }

    #[test]
    fn add_assigns_unique_increasing_ids() {
        let store = KeyedStore::in_memory();
        let habits = habits(&store, &["a", "b", "c"]);
        let ids: Vec<_> = habits.items().iter().map(|h| h.id).collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn add_rejects_blank_title_without_saving() {
        let store = KeyedStore::in_memory();
        let mut quick: EntityCollection<QuickTask> =
            EntityCollection::load(&store, StoreKey::QuickTasks);
        let err = quick
            .add(|id| QuickTask::new(id, "  ".into()))
            .unwrap_err();
        assert!(err.is_benign());
        assert!(quick.is_empty());
        assert!(store.raw(StoreKey::QuickTasks).is_none());
    }

    #[test]
    fn update_missing_id_is_not_found() {
        let store = KeyedStore::in_memory();
        let mut quick: EntityCollection<QuickTask> =
            EntityCollection::load(&store, StoreKey::QuickTasks);
        let err = quick.update(42, |t| t.done = true).unwrap_err();
        assert!(matches!(err, CollectionError::NotFound(42)));
    }

    #[test]
    fn update_rejecting_edit_keeps_original() {
        let store = KeyedStore::in_memory();
        let mut quick = EntityCollection::load(&store, StoreKey::QuickTasks);
        let task = quick.add(|id| QuickTask::new(id, "Call".into())).unwrap();
        assert!(quick.update(task.id, |t| t.title.clear()).is_err());
        assert_eq!(quick.get(task.id).unwrap().title, "Call");
    }

    #[test]
    fn remove_is_idempotent() {
        let store = KeyedStore::in_memory();
        let mut habits = habits(&store, &["a"]);
        let id = habits.items()[0].id;
        assert!(habits.remove(id).unwrap());
        assert!(!habits.remove(id).unwrap());
        let reloaded: EntityCollection<Habit> = EntityCollection::load(&store, StoreKey::Habits);
        assert!(reloaded.is_empty());
    }

    #[test]
    fn reorder_moves_to_target_position() {
        let store = KeyedStore::in_memory();
        let mut habits = habits(&store, &["a", "b", "c", "d"]);
        let a = habits.items()[0].id;
        let c = habits.items()[2].id;
        assert!(habits.reorder(a, c).unwrap());
        assert_eq!(names(&habits), vec!["b", "c", "a", "d"]);
        let d = habits.items()[3].id;
        let b = habits.items()[0].id;
        assert!(habits.reorder(d, b).unwrap());
        assert_eq!(names(&habits), vec!["d", "b", "c", "a"]);
        let orders: Vec<_> = habits.items().iter().map(|h| h.order).collect();
        assert_eq!(orders, vec![0, 1, 2, 3]);
    }

    #[test]
    fn reorder_self_drop_is_noop() {
        let store = KeyedStore::in_memory();
        let mut habits = habits(&store, &["a", "b"]);
        let a = habits.items()[0].id;
        assert!(!habits.reorder(a, a).unwrap());
        assert!(!habits.reorder(a, 999).unwrap());
        assert_eq!(names(&habits), vec!["a", "b"]);
    }

    #[test]
    fn sort_by_order_repairs_stored_order() {
        let store = KeyedStore::in_memory();
        let mut habits = habits(&store, &["a", "b", "c"]);
        let a = habits.items()[0].id;
        habits.update(a, |h| h.order = 9).unwrap();
        let mut reloaded: EntityCollection<Habit> =
            EntityCollection::load(&store, StoreKey::Habits);
        reloaded.sort_by_order();
        assert_eq!(names(&reloaded), vec!["b", "c", "a"]);
    }

    #[test]
    fn task_lifecycle_on_a_fixed_date() {
        let store = KeyedStore::in_memory();
        let day = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let mut tasks = EntityCollection::load(&store, StoreKey::Tasks);
        let task = tasks
            .add(|id| Task::new(id, "Write report".into(), String::new(), TaskCategory::Today, day))
            .unwrap();
        assert_eq!(task.status, TaskStatus::Active);
        assert_eq!(task.date, Some(day));

        tasks.update(task.id, |t| t.status = TaskStatus::Done).unwrap();
        let done: Vec<_> = tasks
            .filter(|t| t.effective_date() == day && t.status == TaskStatus::Done)
            .map(|t| t.id)
            .collect();
        assert_eq!(done, vec![task.id]);

        tasks.remove(task.id).unwrap();
        assert_eq!(
            tasks
                .filter(|t| t.effective_date() == day && t.status == TaskStatus::Done)
                .count(),
            0
        );
    }

    #[derive(Debug, Clone)]
    enum Op {
        Add(String),
        Rename(usize, String),
        Remove(usize),
        Reorder(usize, usize),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            "[a-z]{1,8}".prop_map(Op::Add),
            (0usize..8, "[a-z]{1,8}").prop_map(|(i, s)| Op::Rename(i, s)),
            (0usize..8).prop_map(Op::Remove),
            (0usize..8, 0usize..8).prop_map(|(a, b)| Op::Reorder(a, b)),
        ]
    }

    fn id_at(habits: &EntityCollection<Habit>, idx: usize) -> EntityId {
        habits
            .items()
            .get(idx)
            .map(|h| h.id)
            .unwrap_or(EntityId::MAX)
    }

    proptest! {
        #[test]
        fn saved_collection_reloads_equal(ops in prop::collection::vec(op_strategy(), 0..24)) {
            let store = KeyedStore::in_memory();
            let mut habits: EntityCollection<Habit> = EntityCollection::load(&store, StoreKey::Habits);
            for op in ops {
                match op {
                    Op::Add(name) => {
                        let order = habits.len();
                        habits.add(|id| Habit::new(id, name, order)).unwrap();
                    }
                    Op::Rename(idx, name) => {
                        let _ = habits.update(id_at(&habits, idx), |h| h.name = name);
                    }
                    Op::Remove(idx) => {
                        habits.remove(id_at(&habits, idx)).unwrap();
                    }
                    Op::Reorder(a, b) => {
                        habits.reorder(id_at(&habits, a), id_at(&habits, b)).unwrap();
                    }
                }
            }
            let reloaded: EntityCollection<Habit> = EntityCollection::load(&store, StoreKey::Habits);
            prop_assert_eq!(reloaded.items(), habits.items());
        }

        #[test]
        fn reorder_is_a_dense_permutation(count in 1usize..10, a in 0usize..10, b in 0usize..10) {
            let store = KeyedStore::in_memory();
            let names: Vec<String> = (0..count).map(|i| format!("h{i}")).collect();
            let refs: Vec<&str> = names.iter().map(String::as_str).collect();
            let mut habits = habits(&store, &refs);
            let mut before: Vec<_> = habits.items().iter().map(|h| h.id).collect();
            let (from, to) = (id_at(&habits, a % count), id_at(&habits, b % count));
            habits.reorder(from, to).unwrap();
            let mut after: Vec<_> = habits.items().iter().map(|h| h.id).collect();
            let orders: Vec<_> = habits.items().iter().map(|h| h.order).collect();
            prop_assert_eq!(orders, (0..count).collect::<Vec<_>>());
            before.sort();
            after.sort();
            prop_assert_eq!(before, after);
        }
    }
}
