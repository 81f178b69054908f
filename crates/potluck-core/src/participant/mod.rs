//! Invitations, RSVPs, removal, and host transfer.
//!
//! The "exactly one accepted host" rule is checked twice: once here on a
//! fresh roster read, to produce a reason, and again by the store, whose
//! RSVP update, delete, and role swap all refuse to strip the last host.
//!
//! Leaving the accepted set (declining, answering maybe, or being removed)
//! hands back open claims and assignments in the same store call that
//! changes the membership, so a slot never points at someone who is not
//! coming.

use std::collections::HashSet;
use std::sync::Arc;

use uuid::Uuid;

use potluck_db::models::{Participant, ParticipantProfile, ReleasedSlots, RsvpStatus};

use crate::error::{Entity, PotluckError, Result};
use crate::lookup;
use crate::permission;
use crate::store::MealStore;

/// A recorded RSVP and the slot work it handed back.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RsvpChange {
    pub participant: Participant,
    pub released: ReleasedSlots,
}

pub struct ParticipantCoordinator {
    store: Arc<dyn MealStore>,
}

impl ParticipantCoordinator {
    pub fn new(store: Arc<dyn MealStore>) -> Self {
        Self { store }
    }

    /// Invite users as pending attendees. The host and existing members are
    /// skipped; returns only the rows actually created.
    pub async fn invite(
        &self,
        meal_id: Uuid,
        actor: Uuid,
        user_ids: &[Uuid],
    ) -> Result<Vec<Participant>> {
        let store = self.store.as_ref();
        let meal = lookup::meal(store, meal_id).await?;
        let membership = lookup::membership(store, meal_id, actor).await?;
        permission::can_invite(membership.as_ref(), &meal)?;

        let mut seen = HashSet::new();
        let invitees: Vec<Uuid> = user_ids
            .iter()
            .copied()
            .filter(|id| *id != actor && seen.insert(*id))
            .collect();
        if invitees.is_empty() {
            return Ok(Vec::new());
        }

        let invited = store.insert_invitations(meal_id, actor, &invitees).await?;
        tracing::info!(
            meal_id = %meal_id,
            actor = %actor,
            requested = user_ids.len(),
            invited = invited.len(),
            "guests invited"
        );
        Ok(invited)
    }

    /// Record the user's own RSVP. Anything but `accepted` releases the
    /// user's open claims and assignments.
    pub async fn respond(
        &self,
        meal_id: Uuid,
        user: Uuid,
        response: RsvpStatus,
    ) -> Result<RsvpChange> {
        if response == RsvpStatus::Pending {
            return Err(PotluckError::Validation(
                "respond with accepted, maybe, or declined".to_owned(),
            ));
        }
        let store = self.store.as_ref();
        let meal = lookup::meal(store, meal_id).await?;
        let participants = store.list_participants(meal_id).await?;
        let membership = participants
            .iter()
            .find(|p| p.user_id == user)
            .ok_or_else(|| PotluckError::not_found(Entity::Participant, user))?;
        permission::can_respond(membership, &meal, response, &participants)?;

        match store.update_rsvp(meal_id, user, response).await? {
            Some((participant, released)) => {
                tracing::info!(
                    meal_id = %meal_id,
                    actor = %user,
                    rsvp = %response,
                    released_claims = released.released_claims,
                    cleared_assignments = released.cleared_assignments,
                    "rsvp recorded"
                );
                Ok(RsvpChange {
                    participant,
                    released,
                })
            }
            None => Err(self.roster_changed(meal_id, user, "respond").await),
        }
    }

    /// Remove a participant, releasing their open claims and clearing their
    /// assignments in the same store call. On any failure the member and
    /// their slots are left exactly as they were.
    pub async fn remove(
        &self,
        meal_id: Uuid,
        actor: Uuid,
        target: Uuid,
    ) -> Result<ReleasedSlots> {
        let store = self.store.as_ref();
        lookup::meal(store, meal_id).await?;
        let participants = store.list_participants(meal_id).await?;
        let membership = participants.iter().find(|p| p.user_id == actor);
        let target_row = participants
            .iter()
            .find(|p| p.user_id == target)
            .ok_or_else(|| PotluckError::not_found(Entity::Participant, target))?;
        permission::can_remove_participant(actor, membership, target_row, &participants)?;

        let completed = store.count_completed_for_user(meal_id, target).await?;
        if completed > 0 {
            return Err(PotluckError::InvalidState(format!(
                "participant has {completed} completed dish(es) in this meal and cannot be removed"
            )));
        }

        let Some(removal) = store.delete_participant(meal_id, target).await? else {
            return Err(self.roster_changed(meal_id, target, "remove").await);
        };

        tracing::info!(
            meal_id = %meal_id,
            actor = %actor,
            target = %target,
            released_claims = removal.released_claims,
            cleared_assignments = removal.cleared_assignments,
            "participant removed"
        );
        Ok(removal)
    }

    /// Hand the host role to an accepted participant. Both roles flip in
    /// one store write.
    pub async fn transfer_host(&self, meal_id: Uuid, actor: Uuid, new_host: Uuid) -> Result<()> {
        let store = self.store.as_ref();
        lookup::meal(store, meal_id).await?;
        let membership = lookup::membership(store, meal_id, actor).await?;
        let target = lookup::participant(store, meal_id, new_host).await?;
        permission::can_transfer_host(actor, membership.as_ref(), &target)?;

        if !store.transfer_host(meal_id, actor, new_host).await? {
            return Err(self.roster_changed(meal_id, new_host, "transfer host").await);
        }
        tracing::info!(
            meal_id = %meal_id,
            actor = %actor,
            new_host = %new_host,
            "host transferred"
        );
        Ok(())
    }

    /// Participants with display names, hosts first.
    pub async fn roster(&self, meal_id: Uuid, actor: Uuid) -> Result<Vec<ParticipantProfile>> {
        let store = self.store.as_ref();
        lookup::meal(store, meal_id).await?;
        let membership = lookup::membership(store, meal_id, actor).await?;
        permission::can_view(membership.as_ref())?;
        Ok(store.list_participant_profiles(meal_id).await?)
    }

    async fn roster_changed(&self, meal_id: Uuid, user: Uuid, action: &str) -> PotluckError {
        match self.store.get_participant(meal_id, user).await {
            Ok(None) => PotluckError::not_found(Entity::Participant, user),
            Ok(Some(_)) => {
                tracing::warn!(meal_id = %meal_id, user = %user, action, "roster changed concurrently");
                PotluckError::Conflict(format!(
                    "the meal's roster or slots changed while trying to {action}; reload and retry"
                ))
            }
            Err(e) => PotluckError::Store(e),
        }
    }
}
