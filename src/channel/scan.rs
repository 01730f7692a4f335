//! multi-line listings sent by the server: NAMES and WHO for the roster, and the ban, exception
//! and invite lists. each one is collected into a buffer as the per-item replies arrive, and
//! committed when the matching end-of-list reply arrives.

use indexmap::{IndexMap, IndexSet};

use crate::{channel::Member, constants::numerics::*};

/// the mask lists kept per channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListKind {
    Bans,
    Exceptions,
    Invites,
}

impl ListKind {
    pub const ALL: [ListKind; 3] = [ListKind::Bans, ListKind::Exceptions, ListKind::Invites];

    /// the channel mode letter that adds to and queries this list
    pub fn letter(self) -> char {
        match self {
            ListKind::Bans => 'b',
            ListKind::Exceptions => 'e',
            ListKind::Invites => 'I',
        }
    }

    pub fn from_letter(letter: char) -> Option<Self> {
        ListKind::ALL.into_iter().find(|kind| kind.letter() == letter)
    }

    /// classifies a reply as one item of a list (`false`) or as its end (`true`)
    pub fn from_reply(code: u16) -> Option<(Self, bool)> {
        Some(match code {
            RPL_BANLIST => (ListKind::Bans, false),
            RPL_ENDOFBANLIST => (ListKind::Bans, true),
            RPL_EXCEPTLIST => (ListKind::Exceptions, false),
            RPL_ENDOFEXCEPTLIST => (ListKind::Exceptions, true),
            RPL_INVITELIST => (ListKind::Invites, false),
            RPL_ENDOFINVITELIST => (ListKind::Invites, true),
            _ => return None,
        })
    }

    fn index(self) -> usize {
        match self {
            ListKind::Bans => 0,
            ListKind::Exceptions => 1,
            ListKind::Invites => 2,
        }
    }
}

/// the roster scans
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RosterScanKind {
    Names,
    Who,
}

/// the buffers of every listing currently being received for one channel
#[derive(Debug, Default)]
pub(crate) struct Scans {
    names: Option<IndexSet<String>>,
    who: Option<IndexSet<String>>,
    lists: [Option<Vec<String>>; 3],
}

impl Scans {
    /// records a case folded nick seen by a roster scan, opening the scan if needed
    pub fn saw_member(&mut self, kind: RosterScanKind, nnick: String) {
        self.roster_mut(kind)
            .get_or_insert_with(IndexSet::new)
            .insert(nnick);
    }

    /// closes a roster scan, returning the nicks it saw. a scan that ended without any items saw
    /// nobody.
    pub fn finish_roster(&mut self, kind: RosterScanKind) -> IndexSet<String> {
        self.roster_mut(kind).take().unwrap_or_default()
    }

    pub fn roster_active(&self, kind: RosterScanKind) -> bool {
        match kind {
            RosterScanKind::Names => self.names.is_some(),
            RosterScanKind::Who => self.who.is_some(),
        }
    }

    /// follows a nick change into any open roster scan
    pub fn rename(&mut self, old_nnick: &str, new_nnick: &str) {
        for scan in [&mut self.names, &mut self.who].into_iter().flatten() {
            if scan.shift_remove(old_nnick) {
                scan.insert(new_nnick.to_string());
            }
        }
    }

    pub fn push_list_item(&mut self, kind: ListKind, mask: String) {
        self.lists[kind.index()]
            .get_or_insert_with(Vec::new)
            .push(mask);
    }

    pub fn finish_list(&mut self, kind: ListKind) -> Vec<String> {
        self.lists[kind.index()].take().unwrap_or_default()
    }

    pub fn list_active(&self, kind: ListKind) -> bool {
        self.lists[kind.index()].is_some()
    }

    fn roster_mut(&mut self, kind: RosterScanKind) -> &mut Option<IndexSet<String>> {
        match kind {
            RosterScanKind::Names => &mut self.names,
            RosterScanKind::Who => &mut self.who,
        }
    }
}

/// drops every member the scan did not see, returning how many were dropped
pub(crate) fn reconcile_roster(
    members: &mut IndexMap<String, Member>,
    seen: &IndexSet<String>,
) -> usize {
    let before = members.len();
    members.retain(|nnick, _| seen.contains(nnick));
    before - members.len()
}
