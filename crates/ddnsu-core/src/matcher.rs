//! Pairing desired records with the remote records they own
//!
//! Matching is by ownership tag only, never by name or type: renaming a
//! desired record while keeping its comment is an update, not a
//! create plus delete. Untagged remote records are invisible here.
//!
//! No deletions are planned. A tagged remote record whose desired entry
//! was removed stays in place until the next purge (which a configuration
//! change always triggers through the change detector).

use crate::record::{DesiredRecord, RemoteRecord};

/// Result of matching one domain
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchPlan {
    /// Desired records with no owned remote record
    pub to_create: Vec<DesiredRecord>,
    /// Desired records paired with the remote record they own
    pub to_update: Vec<(DesiredRecord, RemoteRecord)>,
}

impl MatchPlan {
    /// Whether the plan contains no work
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_update.is_empty()
    }
}

/// Match desired records against a domain's remote listing
///
/// A desired record lands in `to_update` iff some tagged remote record's
/// comment equals `DDNSU_<comment>` exactly; otherwise in `to_create`.
/// Comment uniqueness is validated at load time, so at most one remote
/// record is expected per tag. If the provider still holds duplicates,
/// the first one listed is updated.
pub fn match_records(desired: &[DesiredRecord], remote: &[RemoteRecord]) -> MatchPlan {
    let tagged: Vec<&RemoteRecord> = remote.iter().filter(|r| r.is_tagged()).collect();

    let mut plan = MatchPlan::default();
    for record in desired {
        let tag = record.tag();
        match tagged.iter().find(|r| r.is_owned_by(&tag)) {
            Some(owned) => plan.to_update.push((record.clone(), (*owned).clone())),
            None => plan.to_create.push(record.clone()),
        }
    }
    plan
}
