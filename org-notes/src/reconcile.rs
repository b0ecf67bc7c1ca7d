//! Local copy of a note listing kept current by realtime change events.
//!
//! The list is newest-created first. `created` prepends, `modified` replaces
//! in place and `removed` filters by id, so replaying an event is harmless.
//! Selection state (the open note, the edit target and the export
//! selection) never points at a note that is no longer in the list.
//!
//! A listing fetched over the wire can race the event stream. Call
//! [`NoteList::begin_sync`] after subscribing and before fetching, then hand
//! the fetched rows to [`NoteList::finish_sync`]; events received in between
//! are replayed on top of the snapshot.

use std::collections::HashSet;

use crate::{
    notes::{Note, NoteId},
    realtime::ChangeEvent,
};

#[derive(Debug, Clone, Default)]
pub struct NoteList {
    notes: Vec<Note>,
    open: Option<Note>,
    editing: Option<NoteId>,
    selected: HashSet<NoteId>,
    pending: Option<Vec<ChangeEvent<Note>>>,
}

impl NoteList {
    pub fn new(notes: Vec<Note>) -> Self {
        Self {
            notes,
            ..Default::default()
        }
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn get(&self, id: NoteId) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == id)
    }

    /// The note shown in the reader, as of the latest event.
    pub fn open_note(&self) -> Option<&Note> {
        self.open.as_ref()
    }

    pub fn editing(&self) -> Option<NoteId> {
        self.editing
    }

    pub fn is_selected(&self, id: NoteId) -> bool {
        self.selected.contains(&id)
    }

    pub fn is_syncing(&self) -> bool {
        self.pending.is_some()
    }

    fn position(&self, id: NoteId) -> Option<usize> {
        self.notes.iter().position(|n| n.id == id)
    }

    pub fn apply(&mut self, event: ChangeEvent<Note>) {
        match &mut self.pending {
            Some(pending) => pending.push(event),
            None => self.merge(event),
        }
    }

    fn merge(&mut self, event: ChangeEvent<Note>) {
        match event {
            ChangeEvent::Created { new } => {
                self.refresh_open(&new);
                match self.position(new.id) {
                    Some(index) => self.notes[index] = new,
                    None => self.notes.insert(0, new),
                }
            }
            ChangeEvent::Modified { old, new } => {
                if let Some(index) = self.position(old.id) {
                    self.refresh_open(&new);
                    self.notes[index] = new;
                }
            }
            ChangeEvent::Removed { old } => {
                self.notes.retain(|n| n.id != old.id);
                self.forget(old.id);
            }
        }
    }

    fn refresh_open(&mut self, note: &Note) {
        if let Some(open) = self.open.as_mut().filter(|open| open.id == note.id) {
            *open = note.clone();
        }
    }

    fn forget(&mut self, id: NoteId) {
        if self.open.as_ref().is_some_and(|n| n.id == id) {
            self.open = None;
        }
        if self.editing == Some(id) {
            self.editing = None;
        }
        self.selected.remove(&id);
    }

    /// Starts buffering events until [`NoteList::finish_sync`].
    pub fn begin_sync(&mut self) {
        self.pending.get_or_insert_with(Vec::new);
    }

    /// Replaces the list with `snapshot`, then replays the events buffered since
    /// [`NoteList::begin_sync`].
    pub fn finish_sync(&mut self, snapshot: Vec<Note>) {
        let pending = self.pending.take().unwrap_or_default();
        self.notes = snapshot;

        let open = self.open.take().and_then(|open| self.get(open.id).cloned());
        self.open = open;
        if self.editing.is_some_and(|id| self.position(id).is_none()) {
            self.editing = None;
        }
        let notes = &self.notes;
        self.selected.retain(|id| notes.iter().any(|n| n.id == *id));

        for event in pending {
            self.merge(event);
        }
    }

    /// Opens the reader on `id`. False when the note is not in the list.
    pub fn open(&mut self, id: NoteId) -> bool {
        self.open = self.get(id).cloned();
        self.open.is_some()
    }

    pub fn close(&mut self) {
        self.open = None;
    }

    pub fn start_edit(&mut self, id: NoteId) -> bool {
        if self.position(id).is_none() {
            return false;
        }
        self.editing = Some(id);
        true
    }

    pub fn cancel_edit(&mut self) {
        self.editing = None;
    }

    /// Returns whether `id` is selected afterwards.
    pub fn toggle_selected(&mut self, id: NoteId) -> bool {
        if self.position(id).is_none() {
            return false;
        }
        if !self.selected.remove(&id) {
            self.selected.insert(id);
        }
        self.selected.contains(&id)
    }

    /// Selects every note, or clears the selection when everything already is.
    pub fn toggle_select_all(&mut self) {
        if !self.notes.is_empty() && self.notes.iter().all(|n| self.selected.contains(&n.id)) {
            self.selected.clear();
        } else {
            self.selected = self.notes.iter().map(|n| n.id).collect();
        }
    }

    /// Selected notes in list order.
    pub fn selected_notes(&self) -> Vec<&Note> {
        self.notes.iter().filter(|n| self.selected.contains(&n.id)).collect()
    }
}
