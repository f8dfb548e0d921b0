//! Per-session editing state.
//!
//! Each browser session owns a [`SessionState`]. When a list is opened its
//! on-disk contents become the *committed* value and a sorted copy becomes
//! the *draft*. Row edits only touch the draft; [`OpenList::commit`] writes
//! it. Category add/delete are written immediately and then replayed onto
//! the draft so pending edits elsewhere survive.
//!
//! Every write first compares the file's current fingerprint with the one
//! captured when the list was read, and refuses with
//! [`StoreError::Conflict`] if someone else saved in between.

use chrono::{DateTime, Local};
use log::{info, warn};
use serde::Serialize;

use crate::aggregate::{
    CategoryShare, CategoryView, Summary, category_breakdown, category_views, sort_gear_list,
    summarize,
};
use crate::auth::PasswordGate;
use crate::error::{Result, StoreError};
use crate::item::{GearList, Item, ItemEdit};
use crate::notes::{read_notes, write_notes_if_changed};
use crate::store::{GearStore, normalize_name};

/// One gear list opened for editing.
#[derive(Clone, Debug)]
pub struct OpenList {
    pub name: String,
    pub committed: GearList,
    pub draft: GearList,
    pub fingerprint: String,
    pub notes: String,
}

impl OpenList {
    pub fn open(store: &GearStore, name: &str) -> Result<Self> {
        let name = normalize_name(name)?;
        let (committed, fingerprint) = store.load_with_fingerprint(&name)?;
        let notes = read_notes(store, &name)?;

        Ok(OpenList {
            draft: sort_gear_list(&committed),
            name,
            committed,
            fingerprint,
            notes,
        })
    }

    /// True when the draft holds edits that are not on disk.
    pub fn is_dirty(&self) -> bool {
        self.draft != sort_gear_list(&self.committed)
    }

    pub fn discard(&mut self) {
        self.draft = sort_gear_list(&self.committed);
    }

    /// Replace every draft row of `category` with an edited table. An empty
    /// fragment removes the category from the draft.
    pub fn replace_category(&mut self, category: &str, rows: Vec<ItemEdit>) {
        let position = self
            .draft
            .items
            .iter()
            .position(|i| i.category == category)
            .unwrap_or(self.draft.items.len());

        self.draft.items.retain(|i| i.category != category);
        let tail = self.draft.items.split_off(position);
        self.draft
            .items
            .extend(rows.into_iter().map(|row| row.into_item(category)));
        self.draft.items.extend(tail);
        self.draft = sort_gear_list(&self.draft);
    }

    pub fn add_row(&mut self, category: &str) -> Result<()> {
        if !self.draft.has_category(category) {
            return Err(StoreError::Category(format!("no category named {}", category)));
        }
        self.draft.items.push(Item::placeholder(category));
        self.draft = sort_gear_list(&self.draft);
        Ok(())
    }

    /// Overwrite the `index`-th row of the category as displayed.
    pub fn update_row(&mut self, category: &str, index: usize, row: ItemEdit) -> Result<()> {
        let position = self.draft_position(category, index)?;
        self.draft.items[position] = row.into_item(category);
        self.draft = sort_gear_list(&self.draft);
        Ok(())
    }

    pub fn delete_row(&mut self, category: &str, index: usize) -> Result<Item> {
        let position = self.draft_position(category, index)?;
        let removed = self.draft.items.remove(position);
        self.draft = sort_gear_list(&self.draft);
        Ok(removed)
    }

    /// Sort and write the draft. Returns the number of rows written.
    pub fn commit(&mut self, store: &GearStore) -> Result<usize> {
        self.check_unchanged(store)?;
        self.fingerprint = store.save(&self.name, &self.draft)?;
        self.committed = self.draft.clone();
        Ok(self.committed.len())
    }

    /// Append a placeholder row for a new category and write it at once.
    pub fn add_category(&mut self, store: &GearStore, category: &str) -> Result<()> {
        let category = category.trim();
        if category.is_empty() {
            return Err(StoreError::Category("category name is empty".to_string()));
        }
        if self.committed.has_category(category) || self.draft.has_category(category) {
            return Err(StoreError::Category(format!("{} already exists", category)));
        }

        self.check_unchanged(store)?;
        let mut updated = self.committed.clone();
        updated.items.push(Item::placeholder(category));
        self.fingerprint = store.save(&self.name, &updated)?;
        self.committed = sort_gear_list(&updated);

        self.draft.items.push(Item::placeholder(category));
        self.draft = sort_gear_list(&self.draft);
        info!("Added category {} to {}", category, self.name);
        Ok(())
    }

    /// Remove every row of `category`, write at once, and drop the category
    /// from the draft. Returns the number of rows removed from disk.
    pub fn delete_category(&mut self, store: &GearStore, category: &str) -> Result<usize> {
        let before = self.committed.len();
        let remaining: Vec<Item> = self
            .committed
            .items
            .iter()
            .filter(|i| i.category != category)
            .cloned()
            .collect();
        let removed = before - remaining.len();

        if removed > 0 {
            self.check_unchanged(store)?;
            let remaining = GearList::from_items(remaining);
            self.fingerprint = store.save(&self.name, &remaining)?;
            self.committed = sort_gear_list(&remaining);
        }

        self.draft.items.retain(|i| i.category != category);
        info!("Deleted category {} ({} rows) from {}", category, removed, self.name);
        Ok(removed)
    }

    /// Write the note when it changed since it was read.
    pub fn set_notes(&mut self, store: &GearStore, text: &str) -> Result<bool> {
        let written = write_notes_if_changed(store, &self.name, &self.notes, text)?;
        if written {
            self.notes = text.to_string();
        }
        Ok(written)
    }

    fn draft_position(&self, category: &str, index: usize) -> Result<usize> {
        self.draft
            .items
            .iter()
            .enumerate()
            .filter(|(_, i)| i.category == category)
            .map(|(position, _)| position)
            .nth(index)
            .ok_or_else(|| StoreError::RowOutOfRange {
                category: category.to_string(),
                index,
            })
    }

    fn check_unchanged(&self, store: &GearStore) -> Result<()> {
        let current = match store.fingerprint(&self.name) {
            Ok(fingerprint) => fingerprint,
            Err(StoreError::NotFound(_)) => String::new(),
            Err(e) => return Err(e),
        };

        if current != self.fingerprint {
            warn!("Refusing to overwrite {}: changed on disk", self.name);
            return Err(StoreError::Conflict(self.name.clone()));
        }
        Ok(())
    }
}

/// What the page renders for the open list.
#[derive(Serialize, Debug)]
pub struct ListView {
    pub name: String,
    pub categories: Vec<CategoryView>,
    pub summary: Summary,
    pub breakdown: Vec<CategoryShare>,
    pub notes: String,
    pub dirty: bool,
    pub pending_delete: Option<String>,
    pub last_saved: Option<String>,
    pub authenticated: bool,
}

/// A category delete waiting for confirmation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingDelete {
    pub list: String,
    pub category: String,
}

/// Flags and open list belonging to one browser session.
#[derive(Debug, Default)]
pub struct SessionState {
    pub authenticated: bool,
    pub open: Option<OpenList>,
    pub pending_delete: Option<PendingDelete>,
    pub last_saved: Option<DateTime<Local>>,
}

impl SessionState {
    pub fn new() -> Self {
        SessionState::default()
    }

    /// Unlock editing. A wrong password leaves the current flag as it is.
    pub fn login(&mut self, gate: &PasswordGate, password: &str) -> bool {
        let accepted = gate.verify(password);
        if accepted {
            self.authenticated = true;
        }
        accepted
    }

    pub fn logout(&mut self) {
        self.authenticated = false;
        self.pending_delete = None;
    }

    pub fn require_auth(&self) -> Result<()> {
        if self.authenticated {
            Ok(())
        } else {
            Err(StoreError::Unauthorized)
        }
    }

    /// Open `name`, keeping the current draft if that list is already open.
    pub fn open_list(&mut self, store: &GearStore, name: &str) -> Result<&mut OpenList> {
        let name = normalize_name(name)?;
        let reopen = match &self.open {
            Some(open) => open.name != name,
            None => true,
        };

        if reopen {
            let open = OpenList::open(store, &name)?;
            self.pending_delete = None;
            self.open = Some(open);
        }

        self.open
            .as_mut()
            .ok_or_else(|| StoreError::NotFound(name.clone()))
    }

    /// Drop the draft and read the list from disk again.
    pub fn reload(&mut self, store: &GearStore, name: &str) -> Result<&mut OpenList> {
        self.open = None;
        self.open_list(store, name)
    }

    pub fn create_list(&mut self, store: &GearStore, name: &str) -> Result<String> {
        self.require_auth()?;
        let file_name = store.create(name)?;
        self.reload(store, &file_name)?;
        Ok(file_name)
    }

    /// Apply an edit to the draft of `name`.
    pub fn edit<T>(
        &mut self,
        store: &GearStore,
        name: &str,
        edit: impl FnOnce(&mut OpenList) -> Result<T>,
    ) -> Result<T> {
        self.require_auth()?;
        let open = self.open_list(store, name)?;
        edit(open)
    }

    pub fn save(&mut self, store: &GearStore, name: &str) -> Result<usize> {
        self.require_auth()?;
        let rows = self.open_list(store, name)?.commit(store)?;
        self.last_saved = Some(Local::now());
        Ok(rows)
    }

    pub fn add_category(&mut self, store: &GearStore, name: &str, category: &str) -> Result<()> {
        self.require_auth()?;
        self.open_list(store, name)?.add_category(store, category)?;
        self.last_saved = Some(Local::now());
        Ok(())
    }

    /// First step of deleting a category: remember which one.
    pub fn request_delete(&mut self, store: &GearStore, name: &str, category: &str) -> Result<()> {
        self.require_auth()?;
        let open = self.open_list(store, name)?;
        if !open.draft.has_category(category) && !open.committed.has_category(category) {
            return Err(StoreError::Category(format!("no category named {}", category)));
        }
        self.pending_delete = Some(PendingDelete {
            list: open.name.clone(),
            category: category.to_string(),
        });
        Ok(())
    }

    /// Second step: delete on `true`, forget the request on `false`. Returns
    /// the rows removed, or `None` when cancelled.
    pub fn confirm_delete(
        &mut self,
        store: &GearStore,
        name: &str,
        category: &str,
        confirm: bool,
    ) -> Result<Option<usize>> {
        self.require_auth()?;
        let list = normalize_name(name)?;
        let requested = PendingDelete {
            list,
            category: category.to_string(),
        };
        if self.pending_delete.as_ref() != Some(&requested) {
            return Err(StoreError::Category(format!(
                "no pending delete for {} in {}",
                requested.category, requested.list
            )));
        }
        self.pending_delete = None;

        if !confirm {
            return Ok(None);
        }

        let removed = self.open_list(store, name)?.delete_category(store, category)?;
        self.last_saved = Some(Local::now());
        Ok(Some(removed))
    }

    pub fn set_notes(&mut self, store: &GearStore, name: &str, text: &str) -> Result<bool> {
        self.require_auth()?;
        self.open_list(store, name)?.set_notes(store, text)
    }

    pub fn view(&self) -> Option<ListView> {
        let open = self.open.as_ref()?;
        Some(ListView {
            name: open.name.clone(),
            categories: category_views(&open.draft),
            summary: summarize(&open.draft),
            breakdown: category_breakdown(&open.draft),
            notes: open.notes.clone(),
            dirty: open.is_dirty(),
            pending_delete: self
                .pending_delete
                .as_ref()
                .filter(|pending| pending.list == open.name)
                .map(|pending| pending.category.clone()),
            last_saved: self
                .last_saved
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string()),
            authenticated: self.authenticated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::category_total;
    use std::fs;
    use tempfile::tempdir;

    fn edit(name: &str, weight: f64, quantity: i64) -> ItemEdit {
        ItemEdit {
            name: name.to_string(),
            weight,
            quantity,
            ..ItemEdit::default()
        }
    }

    fn seeded_store() -> (tempfile::TempDir, GearStore) {
        let dir = tempdir().unwrap();
        let store = GearStore::new(dir.path());
        let list = GearList::from_items(vec![
            Item::new("tent", "shelter", 1200.0, 1),
            Item::new("stakes", "shelter", 10.0, 8),
            Item::new("bar", "food", 50.0, 3),
        ]);
        store.create("trip").unwrap();
        store.save("trip", &list).unwrap();
        (dir, store)
    }

    fn authed() -> SessionState {
        let mut session = SessionState::new();
        assert!(session.login(&PasswordGate::default(), "featherpack"));
        session
    }

    #[test]
    fn test_edits_stay_in_draft_until_commit() {
        let (_dir, store) = seeded_store();
        let mut open = OpenList::open(&store, "trip").unwrap();
        assert!(!open.is_dirty());

        open.replace_category("food", vec![edit("bar", 50.0, 3), edit("noodles", 120.0, 2)]);
        assert!(open.is_dirty());
        assert_eq!(store.load("trip").unwrap().len(), 3);

        open.commit(&store).unwrap();
        assert!(!open.is_dirty());
        let saved = store.load("trip").unwrap();
        assert_eq!(saved.len(), 4);
        let food: Vec<&str> = saved.items_in("food").map(|i| i.name.as_str()).collect();
        assert_eq!(food, vec!["noodles", "bar"]);
    }

    #[test]
    fn test_row_operations_use_display_order() {
        let (_dir, store) = seeded_store();
        let mut open = OpenList::open(&store, "trip").unwrap();

        // shelter displays as tent (1200), stakes (80)
        open.update_row("shelter", 1, edit("ti stakes", 6.0, 8)).unwrap();
        let stakes = open.draft.items_in("shelter").nth(1).unwrap();
        assert_eq!(stakes.name, "ti stakes");
        assert_eq!(stakes.category, "shelter");

        let removed = open.delete_row("shelter", 0).unwrap();
        assert_eq!(removed.name, "tent");
        assert!(matches!(
            open.delete_row("shelter", 5),
            Err(StoreError::RowOutOfRange { .. })
        ));

        open.add_row("food").unwrap();
        assert_eq!(open.draft.items_in("food").count(), 2);
        assert!(matches!(open.add_row("nope"), Err(StoreError::Category(_))));
    }

    #[test]
    fn test_commit_refuses_when_file_changed() {
        let (dir, store) = seeded_store();
        let mut mine = OpenList::open(&store, "trip").unwrap();
        let mut theirs = OpenList::open(&store, "trip").unwrap();

        theirs.replace_category("food", vec![edit("gel", 30.0, 4)]);
        theirs.commit(&store).unwrap();
        let on_disk = fs::read(dir.path().join("trip.csv")).unwrap();

        mine.replace_category("food", vec![]);
        assert!(matches!(mine.commit(&store), Err(StoreError::Conflict(_))));
        assert_eq!(fs::read(dir.path().join("trip.csv")).unwrap(), on_disk);
    }

    #[test]
    fn test_delete_category_keeps_other_pending_edits() {
        let (_dir, store) = seeded_store();
        let mut open = OpenList::open(&store, "trip").unwrap();

        open.replace_category("shelter", vec![edit("tarp", 300.0, 1)]);
        let removed = open.delete_category(&store, "food").unwrap();
        assert_eq!(removed, 1);

        let saved = store.load("trip").unwrap();
        assert!(!saved.has_category("food"));
        assert_eq!(saved.items_in("shelter").count(), 2);
        assert_eq!(category_total(&saved, "shelter"), 1280.0);
        assert_eq!(category_total(&open.committed, "shelter"), 1280.0);

        // the unsaved shelter edit is still staged
        assert!(open.is_dirty());
        let shelter: Vec<&str> = open.draft.items_in("shelter").map(|i| i.name.as_str()).collect();
        assert_eq!(shelter, vec!["tarp"]);
    }

    #[test]
    fn test_add_category_persists_placeholder() {
        let (_dir, store) = seeded_store();
        let mut open = OpenList::open(&store, "trip").unwrap();

        open.add_category(&store, " water ").unwrap();
        let saved = store.load("trip").unwrap();
        let water: Vec<&Item> = saved.items_in("water").collect();
        assert_eq!(water.len(), 1);
        assert_eq!(water[0].quantity, 1);
        assert_eq!(water[0].weight, 0.0);
        assert!(!water[0].wearable && !water[0].consumable && !water[0].luxury);

        assert!(matches!(
            open.add_category(&store, "water"),
            Err(StoreError::Category(_))
        ));
        assert!(matches!(open.add_category(&store, "  "), Err(StoreError::Category(_))));
    }

    #[test]
    fn test_delete_category_leaves_other_totals() {
        let (_dir, store) = seeded_store();
        store
            .save(
                "trip",
                &GearList::from_items(vec![
                    Item::new("tent", "shelter", 1200.0, 1),
                    Item::new("stakes", "shelter", 10.0, 8),
                    Item::new("bar", "food", 50.0, 3),
                    Item::new("pot", "kitchen", 120.0, 1),
                    Item::new("spork", "kitchen", 15.0, 1),
                ]),
            )
            .unwrap();
        let mut open = OpenList::open(&store, "trip").unwrap();

        open.delete_category(&store, "food").unwrap();

        let saved = store.load("trip").unwrap();
        assert_eq!(category_total(&saved, "food"), 0.0);
        assert_eq!(category_total(&saved, "shelter"), 1280.0);
        assert_eq!(category_total(&saved, "kitchen"), 135.0);
        assert_eq!(category_total(&open.draft, "shelter"), 1280.0);
        assert_eq!(category_total(&open.draft, "kitchen"), 135.0);
        assert_eq!(summarize(&saved).total, 1415.0);
    }

    #[test]
    fn test_failed_category_write_keeps_committed() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("gone");
        let store = GearStore::new(missing.clone());
        let list = GearList::from_items(vec![Item::new("tent", "shelter", 1200.0, 1)]);
        let mut open = OpenList {
            name: "trip.csv".to_string(),
            committed: list.clone(),
            draft: list,
            fingerprint: String::new(),
            notes: String::new(),
        };

        assert!(matches!(
            open.add_category(&store, "water"),
            Err(StoreError::Io(_))
        ));
        assert!(!open.committed.has_category("water"));
        assert!(!open.draft.has_category("water"));
        assert!(open.fingerprint.is_empty());
        assert!(!open.is_dirty());

        fs::create_dir(&missing).unwrap();
        open.add_category(&store, "water").unwrap();
        assert!(store.load("trip").unwrap().has_category("water"));
        assert!(!open.is_dirty());
    }

    #[test]
    fn test_confirm_for_another_list_deletes_nothing() {
        let (_dir, store) = seeded_store();
        store
            .save("other", &GearList::from_items(vec![Item::new("gel", "food", 30.0, 2)]))
            .unwrap();
        let mut session = authed();

        session.request_delete(&store, "trip", "food").unwrap();
        assert!(matches!(
            session.confirm_delete(&store, "other", "food", true),
            Err(StoreError::Category(_))
        ));
        assert!(store.load("other").unwrap().has_category("food"));
        assert!(store.load("trip").unwrap().has_category("food"));

        // the request still belongs to trip and can be confirmed there
        assert_eq!(
            session.confirm_delete(&store, "trip.csv", "food", true).unwrap(),
            Some(1)
        );
        assert!(!store.load("trip").unwrap().has_category("food"));
    }

    #[test]
    fn test_wrong_password_keeps_existing_unlock() {
        let mut session = authed();
        assert!(!session.login(&PasswordGate::default(), "wrong"));
        assert!(session.authenticated);

        session.logout();
        assert!(!session.authenticated);
    }

    #[test]
    fn test_unauthenticated_session_changes_nothing() {
        let (dir, store) = seeded_store();
        let before = fs::read(dir.path().join("trip.csv")).unwrap();
        let mut session = SessionState::new();

        assert!(!session.login(&PasswordGate::default(), "wrong"));
        assert!(matches!(
            session.add_category(&store, "trip", "water"),
            Err(StoreError::Unauthorized)
        ));
        assert!(matches!(
            session.edit(&store, "trip", |open| open.add_row("food")),
            Err(StoreError::Unauthorized)
        ));
        assert!(matches!(session.save(&store, "trip"), Err(StoreError::Unauthorized)));
        assert!(matches!(
            session.set_notes(&store, "trip", "hi"),
            Err(StoreError::Unauthorized)
        ));

        assert_eq!(fs::read(dir.path().join("trip.csv")).unwrap(), before);
        assert!(!dir.path().join("trip_notes.txt").exists());
    }

    #[test]
    fn test_two_step_delete() {
        let (_dir, store) = seeded_store();
        let mut session = authed();

        session.request_delete(&store, "trip", "food").unwrap();
        assert_eq!(
            session.pending_delete,
            Some(PendingDelete {
                list: "trip.csv".to_string(),
                category: "food".to_string(),
            })
        );
        assert_eq!(session.confirm_delete(&store, "trip", "food", false).unwrap(), None);
        assert!(store.load("trip").unwrap().has_category("food"));

        session.request_delete(&store, "trip", "food").unwrap();
        assert_eq!(session.confirm_delete(&store, "trip", "food", true).unwrap(), Some(1));
        assert!(!store.load("trip").unwrap().has_category("food"));
        assert!(session.pending_delete.is_none());
        assert!(session.last_saved.is_some());

        assert!(session.confirm_delete(&store, "trip", "food", true).is_err());
        assert!(session.request_delete(&store, "trip", "missing").is_err());
    }

    #[test]
    fn test_session_view_and_notes() {
        let (_dir, store) = seeded_store();
        let mut session = authed();

        session.open_list(&store, "trip").unwrap();
        assert!(session.set_notes(&store, "trip", "bring cash").unwrap());
        assert!(!session.set_notes(&store, "trip", "bring cash").unwrap());

        let view = session.view().unwrap();
        assert_eq!(view.name, "trip.csv");
        assert_eq!(view.notes, "bring cash");
        assert_eq!(view.categories[0].category, "shelter");
        assert_eq!(view.summary.total, 1200.0 + 80.0 + 150.0);
        assert!(!view.dirty);
        assert!(view.authenticated);
    }

    #[test]
    fn test_reopening_same_list_keeps_draft() {
        let (_dir, store) = seeded_store();
        let mut session = authed();

        session
            .edit(&store, "trip", |open| open.add_row("food"))
            .unwrap();
        assert!(session.open_list(&store, "trip.csv").unwrap().is_dirty());
        assert!(!session.reload(&store, "trip").unwrap().is_dirty());
    }
}
