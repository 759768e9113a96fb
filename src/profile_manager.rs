use dialoguer::{theme::ColorfulTheme, Confirm, Input, Select};
use rusqlite::Connection;

use crate::database::{
    models::{ListFilter, User},
    movies, shows, tracked, users,
};
use crate::errors::WatchlistError;

pub fn run_interactive_profile_manager(conn: &Connection) -> Result<(), WatchlistError> {
    loop {
        let options = vec![
            "View all profiles",
            "Create a profile",
            "Set a profile avatar",
            "Delete a profile",
            "Exit",
        ];

        let selection = Select::with_theme(&ColorfulTheme::default())
            .with_prompt("Profile Manager - Main Menu")
            .items(&options)
            .default(0)
            .interact()
            .map_err(|e| WatchlistError::Parse(format!("Selection error: {}", e)))?;

        match selection {
            0 => view_profiles(conn)?,
            1 => create_profile(conn)?,
            2 => set_avatar(conn)?,
            3 => delete_profile(conn)?,
            4 => {
                println!("Exiting profile manager...");
                break;
            }
            _ => unreachable!(),
        }
    }
    Ok(())
}

/// "Frank [1] (3 movies, 2 shows)"
fn describe(conn: &Connection, user: &User) -> Result<String, WatchlistError> {
    let movie_count = movies::get_stats(conn, user.id)?.total_tracked;
    let show_count = tracked::list::<shows::Show>(conn, user.id, &ListFilter::default())?.len();
    Ok(format!(
        "{} [{}] ({} movies, {} shows)",
        user.name, user.id, movie_count, show_count
    ))
}

fn pick_profile(conn: &Connection, prompt: &str) -> Result<Option<User>, WatchlistError> {
    let profiles = users::list_users(conn)?;
    if profiles.is_empty() {
        println!("\nNo profiles found in database.");
        return Ok(None);
    }

    let displays = profiles
        .iter()
        .map(|u| describe(conn, u))
        .collect::<Result<Vec<_>, _>>()?;

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .items(&displays)
        .default(0)
        .interact()
        .map_err(|e| WatchlistError::Parse(format!("Selection error: {}", e)))?;

    Ok(profiles.into_iter().nth(selection))
}

fn view_profiles(conn: &Connection) -> Result<(), WatchlistError> {
    let profiles = users::list_users(conn)?;

    if profiles.is_empty() {
        println!("\nNo profiles found in database.");
        return Ok(());
    }

    println!("\n=== Profiles ===");
    for user in &profiles {
        match &user.avatar_path {
            Some(avatar) => println!("  {} - avatar: {}", describe(conn, user)?, avatar),
            None => println!("  {}", describe(conn, user)?),
        }
    }
    println!("\nTotal: {} profiles", profiles.len());
    println!();

    Ok(())
}

fn create_profile(conn: &Connection) -> Result<(), WatchlistError> {
    let name: String = Input::with_theme(&ColorfulTheme::default())
        .with_prompt("Profile name")
        .interact_text()
        .map_err(|e| WatchlistError::Parse(format!("Input error: {}", e)))?;

    if name.trim().is_empty() {
        println!("Profile name cannot be empty.");
        return Ok(());
    }

    let user = users::create_user(conn, &name)?;
    println!("\n✓ Profile '{}' created with id {}", user.name, user.id);
    Ok(())
}

fn set_avatar(conn: &Connection) -> Result<(), WatchlistError> {
    let Some(user) = pick_profile(conn, "Select a profile")? else {
        return Ok(());
    };

    let avatar: String = Input::with_theme(&ColorfulTheme::default())
        .with_prompt("Avatar path (leave empty to clear)")
        .with_initial_text(user.avatar_path.clone().unwrap_or_default())
        .allow_empty(true)
        .interact_text()
        .map_err(|e| WatchlistError::Parse(format!("Input error: {}", e)))?;

    let avatar = avatar.trim();
    let updated = users::set_avatar_path(conn, user.id, (!avatar.is_empty()).then_some(avatar))?;
    match updated.avatar_path {
        Some(path) => println!("\n✓ Avatar of '{}' set to {}", updated.name, path),
        None => println!("\n✓ Avatar of '{}' cleared", updated.name),
    }
    Ok(())
}

fn delete_profile(conn: &Connection) -> Result<(), WatchlistError> {
    let Some(user) = pick_profile(conn, "Select a profile to delete (its whole library goes with it)")? else {
        return Ok(());
    };

    let confirm = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(format!("Delete '{}'? This removes {}", user.name, describe(conn, &user)?))
        .default(false)
        .interact()
        .map_err(|e| WatchlistError::Parse(format!("Confirmation error: {}", e)))?;

    if !confirm {
        println!("Cancelled.");
        return Ok(());
    }

    users::delete_user(conn, user.id)?;
    println!("\n✓ Profile '{}' deleted", user.name);
    Ok(())
}
