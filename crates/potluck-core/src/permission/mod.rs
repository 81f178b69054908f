//! Authorization rules for meal, participant, and slot transitions.
//!
//! Every function here is pure: callers load the rows, ask for a
//! [`Decision`], and only then issue the conditional write. A decision is
//! advisory for the race-prone cases (the write re-checks its own
//! precondition), but it is what produces the human-readable reason.
//!
//! `membership` is always the acting user's own participant row for the
//! meal, or `None` when they do not belong to it.

use uuid::Uuid;

use potluck_db::models::{Meal, MealStatus, Participant, PlanItem, RsvpStatus};

use crate::error::PotluckError;

/// Why a request was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Denial {
    /// The actor's role, RSVP, or ownership does not permit the action.
    Forbidden(String),
    /// The action is not legal in the current state of the meal or slot.
    IllegalState(String),
    /// Someone else already holds the slot.
    Taken(String),
}

impl Denial {
    pub fn reason(&self) -> &str {
        match self {
            Self::Forbidden(r) | Self::IllegalState(r) | Self::Taken(r) => r,
        }
    }
}

impl From<Denial> for PotluckError {
    fn from(denial: Denial) -> Self {
        match denial {
            Denial::Forbidden(r) => PotluckError::PermissionDenied(r),
            Denial::IllegalState(r) => PotluckError::InvalidState(r),
            Denial::Taken(r) => PotluckError::Conflict(r),
        }
    }
}

pub type Decision = Result<(), Denial>;

fn forbidden(reason: impl Into<String>) -> Decision {
    Err(Denial::Forbidden(reason.into()))
}

fn illegal(reason: impl Into<String>) -> Decision {
    Err(Denial::IllegalState(reason.into()))
}

/// True when the membership row carries host authority.
pub fn is_host(membership: Option<&Participant>) -> bool {
    membership.is_some_and(Participant::is_accepted_host)
}

/// True when some accepted host other than `user_id` is in `participants`.
pub fn other_host_remains(participants: &[Participant], user_id: Uuid) -> bool {
    participants
        .iter()
        .any(|p| p.user_id != user_id && p.is_accepted_host())
}

fn require_host(membership: Option<&Participant>, action: &str) -> Decision {
    if is_host(membership) {
        Ok(())
    } else {
        forbidden(format!("only the host can {action}"))
    }
}

fn require_planning(meal: &Meal) -> Decision {
    match meal.status {
        MealStatus::Planning => Ok(()),
        MealStatus::Completed => illegal(format!("meal {:?} is already completed", meal.title)),
    }
}

fn require_no_dish(item: &PlanItem) -> Decision {
    if item.dish_id.is_some() {
        illegal(format!("{} is already completed", item.label()))
    } else {
        Ok(())
    }
}

// -- meals -----------------------------------------------------------------

/// Read access: any participant, whatever their RSVP.
pub fn can_view(membership: Option<&Participant>) -> Decision {
    match membership {
        Some(_) => Ok(()),
        None => forbidden("you are not a participant of this meal"),
    }
}

/// Update, complete, or delete the meal.
pub fn can_manage_meal(membership: Option<&Participant>) -> Decision {
    require_host(membership, "manage this meal")
}

// -- participants ----------------------------------------------------------

pub fn can_invite(membership: Option<&Participant>, meal: &Meal) -> Decision {
    require_host(membership, "invite guests")?;
    require_planning(meal)
}

/// `participants` is the full roster, used for the last-host rule.
pub fn can_respond(
    membership: &Participant,
    meal: &Meal,
    response: RsvpStatus,
    participants: &[Participant],
) -> Decision {
    require_planning(meal)?;
    if membership.is_accepted_host()
        && response != RsvpStatus::Accepted
        && !other_host_remains(participants, membership.user_id)
    {
        return illegal("the only host cannot step back; transfer the host role first");
    }
    Ok(())
}

pub fn can_remove_participant(
    actor: Uuid,
    membership: Option<&Participant>,
    target: &Participant,
    participants: &[Participant],
) -> Decision {
    require_host(membership, "remove guests")?;
    if target.user_id == actor {
        return forbidden("the host cannot remove themselves");
    }
    if target.is_accepted_host() && !other_host_remains(participants, target.user_id) {
        return illegal("removing this participant would leave the meal without a host");
    }
    Ok(())
}

pub fn can_transfer_host(
    actor: Uuid,
    membership: Option<&Participant>,
    target: &Participant,
) -> Decision {
    require_host(membership, "transfer the host role")?;
    if target.user_id == actor {
        return illegal("you are already the host");
    }
    if target.rsvp_status != RsvpStatus::Accepted {
        return forbidden(format!(
            "the new host must have accepted the invitation (currently {})",
            target.rsvp_status
        ));
    }
    Ok(())
}

// -- plan items ------------------------------------------------------------

pub fn can_add_items(membership: Option<&Participant>, meal: &Meal) -> Decision {
    require_host(membership, "add dish slots")?;
    require_planning(meal)
}

/// Assign or unassign. Claimed slots must be released first.
pub fn can_assign(membership: Option<&Participant>, meal: &Meal, item: &PlanItem) -> Decision {
    require_host(membership, "assign dish slots")?;
    require_planning(meal)?;
    require_no_dish(item)?;
    if item.claimed_by.is_some() {
        return illegal(format!(
            "{} is already claimed; unclaim it first",
            item.label()
        ));
    }
    Ok(())
}

/// The host may claim any open slot, including one assigned to someone
/// else. Other participants need an accepted RSVP and a slot that is
/// unassigned or assigned to them.
pub fn can_claim(
    actor: Uuid,
    membership: Option<&Participant>,
    meal: &Meal,
    item: &PlanItem,
) -> Decision {
    require_planning(meal)?;
    require_no_dish(item)?;
    let Some(member) = membership else {
        return forbidden("you are not a participant of this meal");
    };
    let host = member.is_accepted_host();
    if !host && member.rsvp_status != RsvpStatus::Accepted {
        return forbidden(format!(
            "accept the invitation before claiming (RSVP is {})",
            member.rsvp_status
        ));
    }
    if let Some(claimer) = item.claimed_by {
        let who = if claimer == actor { "you" } else { "someone else" };
        return Err(Denial::Taken(format!(
            "{} is already claimed by {who}",
            item.label()
        )));
    }
    match item.assigned_to {
        Some(assignee) if assignee != actor && !host => {
            forbidden(format!("{} is assigned to another guest", item.label()))
        }
        _ => Ok(()),
    }
}

pub fn can_unclaim(
    actor: Uuid,
    membership: Option<&Participant>,
    meal: &Meal,
    item: &PlanItem,
) -> Decision {
    require_planning(meal)?;
    require_no_dish(item)?;
    let Some(claimer) = item.claimed_by else {
        return illegal(format!("{} is not claimed", item.label()));
    };
    if claimer == actor || is_host(membership) {
        Ok(())
    } else {
        forbidden("only the claimer or the host can release this slot")
    }
}

pub fn can_attach_recipe(actor: Uuid, meal: &Meal, item: &PlanItem) -> Decision {
    require_planning(meal)?;
    require_no_dish(item)?;
    if item.claimed_by == Some(actor) {
        Ok(())
    } else {
        forbidden("only the current claimer can choose the recipe")
    }
}

/// Completion is allowed after the meal itself is completed, so dishes
/// cooked for the meal can still be linked.
pub fn can_complete(actor: Uuid, item: &PlanItem) -> Decision {
    require_no_dish(item)?;
    match item.claimed_by {
        None => illegal(format!("{} must be claimed before it is completed", item.label())),
        Some(claimer) if claimer != actor => {
            forbidden("only the current claimer can complete this slot")
        }
        Some(_) => Ok(()),
    }
}

pub fn can_delete_item(membership: Option<&Participant>, meal: &Meal, item: &PlanItem) -> Decision {
    require_host(membership, "remove dish slots")?;
    require_planning(meal)?;
    require_no_dish(item)?;
    if item.claimed_by.is_some() {
        return illegal(format!(
            "{} is claimed; release it before removing",
            item.label()
        ));
    }
    Ok(())
}
