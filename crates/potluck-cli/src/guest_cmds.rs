//! Handlers for `potluck guest` subcommands.

use anyhow::Result;
use uuid::Uuid;

use potluck_core::Engine;

use crate::GuestCommands;
use crate::render;

pub async fn run_guest_command(
    command: GuestCommands,
    engine: &Engine,
    user: Uuid,
    json: bool,
) -> Result<()> {
    let participants = &engine.participants;
    match command {
        GuestCommands::Invite { meal_id, users } => {
            let invited = participants.invite(meal_id, user, &users).await?;
            render::emit(json, &invited, || {
                let skipped = users.len().saturating_sub(invited.len());
                let mut out = format!("Invited {} user(s).\n", invited.len());
                if skipped > 0 {
                    out.push_str(&format!("Skipped {skipped} already on the list.\n"));
                }
                Ok(out)
            })
        }
        GuestCommands::Respond { meal_id, response } => {
            let change = participants.respond(meal_id, user, response).await?;
            render::emit(json, &change, || {
                let mut out = format!("RSVP recorded: {}.\n", change.participant.rsvp_status);
                if !change.released.is_empty() {
                    out.push_str(&format!(
                        "Released {} claim(s) and {} assignment(s).\n",
                        change.released.released_claims, change.released.cleared_assignments
                    ));
                }
                Ok(out)
            })
        }
        GuestCommands::Remove {
            meal_id,
            user: target,
        } => {
            let removal = participants.remove(meal_id, user, target).await?;
            render::emit(json, &removal, || {
                Ok(format!(
                    "Removed {target}. Released {} claim(s) and {} assignment(s).\n",
                    removal.released_claims, removal.cleared_assignments
                ))
            })
        }
        GuestCommands::TransferHost {
            meal_id,
            user: target,
        } => {
            participants.transfer_host(meal_id, user, target).await?;
            let roster = participants.roster(meal_id, target).await?;
            render::emit(json, &roster, || Ok(format!("{target} is now the host.\n")))
        }
        GuestCommands::List { meal_id } => {
            let roster = participants.roster(meal_id, user).await?;
            render::emit(json, &roster, || render::roster_table(&roster))
        }
    }
}
