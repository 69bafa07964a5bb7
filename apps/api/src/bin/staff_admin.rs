//! Out-of-band staff account provisioning. Accounts are never created by the
//! web-facing flows; clinic operators run this on the host instead.
//!
//! Usage:
//!   staff-admin create
//!   staff-admin activate <email>
//!   staff-admin deactivate <email>

use std::io::{self, BufRead, Write};

use dotenv::dotenv;

use shared_config::AppConfig;
use staff_cell::models::StaffError;
use staff_cell::services::accounts::StaffAccountService;

fn prompt(label: &str) -> io::Result<String> {
    print!("{}: ", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn prompt_required(label: &str) -> io::Result<String> {
    loop {
        let value = prompt(label)?;
        if !value.is_empty() {
            return Ok(value);
        }
        println!("{} must not be empty. Please try again.", label);
    }
}

fn usage() -> ! {
    eprintln!("usage: staff-admin [create | activate <email> | deactivate <email>]");
    std::process::exit(2);
}

fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("create");

    let config = AppConfig::from_env();
    shared_database::init(&config)?;
    let service = StaffAccountService::open(&config)?;

    match command {
        "create" => {
            let email = prompt_required("Email")?;
            let name = prompt_required("Name")?;
            let password = prompt_required("Password")?;

            match service.create(&email, &name, &password) {
                Ok(user) => println!("Created staff user id={}", user.id),
                Err(StaffError::DuplicateEmail) => println!("That email already exists."),
                Err(e) => return Err(e.into()),
            }
        }
        "activate" | "deactivate" => {
            let Some(email) = args.get(2) else { usage() };
            let activate = command == "activate";
            match service.set_active(email, activate) {
                Ok(()) => println!(
                    "Staff user {} is now {}.",
                    email,
                    if activate { "active" } else { "inactive" }
                ),
                Err(StaffError::NotFound) => println!("No staff user with that email."),
                Err(e) => return Err(e.into()),
            }
        }
        _ => usage(),
    }

    Ok(())
}
