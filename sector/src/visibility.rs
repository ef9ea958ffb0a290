//! Visibility and recipient-set computation
//!
//! One state change fans out to several audiences whose memberships come
//! from different sources: explicit combatant lists, sector presence,
//! corporation rosters, and garrison ownership. `compute_recipients` merges
//! them into a deduplicated, ordered set; the first reason seen for a
//! character wins.

use std::collections::BTreeSet;

use starhold_common::errors::GameError;
use starhold_common::events::{EventRecipient, VisibilityReason};
use starhold_common::types::{CharacterId, CorporationId, SectorId};

use crate::state::ShardState;

/// Which sources feed one event's recipient set
#[derive(Debug, Clone, Default)]
pub struct RecipientSpec {
    /// Activates the `sector_snapshot` and garrison sources for this sector
    pub sector: Option<SectorId>,
    /// Corporations whose active members are included
    pub corporations: Vec<CorporationId>,
    /// Explicit recipients, e.g. combat participants
    pub direct: Vec<CharacterId>,
    /// Characters removed from the final set
    pub exclude: Vec<CharacterId>,
}

impl RecipientSpec {
    pub fn direct_to(character: &str) -> Self {
        Self {
            direct: vec![character.to_string()],
            ..Self::default()
        }
    }

    pub fn sector_wide(sector: SectorId) -> Self {
        Self {
            sector: Some(sector),
            ..Self::default()
        }
    }
}

/// Merge materialized rosters into the final recipient set.
///
/// `garrisons` carries one entry per garrison in the sector: its owner and
/// the active roster of the owner's corporation.
pub fn compute_recipients(
    direct: &[CharacterId],
    sector_pilots: &[CharacterId],
    corp_rosters: &[Vec<CharacterId>],
    garrisons: &[(CharacterId, Vec<CharacterId>)],
    exclude: &[CharacterId],
) -> Vec<EventRecipient> {
    let excluded: BTreeSet<&CharacterId> = exclude.iter().collect();
    let mut seen: BTreeSet<CharacterId> = BTreeSet::new();
    let mut recipients = Vec::new();

    let mut push = |character: &CharacterId, reason: VisibilityReason| {
        if excluded.contains(character) || !seen.insert(character.clone()) {
            return;
        }
        recipients.push(EventRecipient {
            character_id: character.clone(),
            reason,
        });
    };

    for character in direct {
        push(character, VisibilityReason::Direct);
    }
    for character in sector_pilots {
        push(character, VisibilityReason::SectorSnapshot);
    }
    for roster in corp_rosters {
        for character in roster {
            push(character, VisibilityReason::CorpMember);
        }
    }
    for (owner, corp_roster) in garrisons {
        push(owner, VisibilityReason::GarrisonOwner);
        for character in corp_roster {
            push(character, VisibilityReason::GarrisonCorpMember);
        }
    }

    recipients
}

/// Materialize the spec's sources from shard state and merge them
pub async fn recipients_for(
    state: &ShardState,
    spec: &RecipientSpec,
) -> Result<Vec<EventRecipient>, GameError> {
    let mut sector_pilots = Vec::new();
    let mut garrisons = Vec::new();
    if let Some(sector) = spec.sector {
        sector_pilots = state.pilots_in_sector(sector).await?;
        for garrison in state.garrisons_in(sector).await? {
            let corp_roster = match garrison.owner_corporation {
                Some(corp) => state.corp_roster(corp).await?,
                None => Vec::new(),
            };
            garrisons.push((garrison.owner, corp_roster));
        }
    }

    let mut corp_rosters = Vec::new();
    for corp in &spec.corporations {
        corp_rosters.push(state.corp_roster(*corp).await?);
    }

    Ok(compute_recipients(
        &spec.direct,
        &sector_pilots,
        &corp_rosters,
        &garrisons,
        &spec.exclude,
    ))
}
