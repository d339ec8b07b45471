//! Genome Vault - CLI
//!
//! Command-line interface for vault operations. Face frames come from
//! image files via `--frame`; the reference grid embedder stands in for
//! a camera-backed CNN model.

use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use env_logger::Env;

use genome_vault::mail::LogMailer;
use genome_vault::matcher::{global_model, install_model};
use genome_vault::mfa::AuthSession;
use genome_vault::{GridEmbedder, VaultApi, VaultConfig, VaultError};

#[derive(Parser)]
#[command(name = "genome-vault")]
#[command(version = genome_vault::VERSION)]
#[command(about = "Genome Vault - DNA-keyed encrypted patient records")]
struct Cli {
    /// Data directory
    #[arg(short, long, default_value = "./vault_data")]
    data: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a new patient record (no authentication required)
    Store {
        /// Numeric record ID
        id: String,

        /// Patient full name
        #[arg(long)]
        full_name: String,

        /// Patient email
        #[arg(long)]
        email: String,

        /// 10-digit contact number
        #[arg(long)]
        contact: String,

        /// Date of birth (YYYY-MM-DD)
        #[arg(long)]
        dob: String,

        /// Gender
        #[arg(long)]
        gender: String,

        /// Address
        #[arg(long)]
        address: String,

        /// DNA sequence (the record's key material)
        #[arg(long)]
        dna: String,
    },

    /// Retrieve and decrypt a record (admin authentication required)
    Retrieve {
        /// Record ID
        id: String,

        /// Face frame image for the first factor
        #[arg(long)]
        frame: PathBuf,
    },

    /// Permanently delete a record (admin authentication required)
    Delete {
        /// Record ID
        id: String,

        /// Face frame image for the first factor
        #[arg(long)]
        frame: PathBuf,
    },

    /// Register a new admin face (master OTP approval)
    RegisterAdmin {
        /// Admin name
        name: String,

        /// Admin contact address for OTP delivery
        #[arg(long)]
        contact: String,

        /// Face frame image to enroll
        #[arg(long)]
        frame: PathBuf,
    },

    /// Show the face-verification attempt log
    Log,
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    install_model(Arc::new(GridEmbedder));

    let config = VaultConfig::rooted(&cli.data);
    let vault = VaultApi::open(config, global_model()?, Arc::new(LogMailer))?;

    match cli.command {
        Commands::Store {
            id,
            full_name,
            email,
            contact,
            dob,
            gender,
            address,
            dna,
        } => {
            validate_intake(&id, &full_name, &email, &contact, &dna)?;

            let mut fields = BTreeMap::new();
            fields.insert("full_name".to_string(), full_name);
            fields.insert("email".to_string(), email);
            fields.insert("contact_number".to_string(), contact);
            fields.insert("date_of_birth".to_string(), dob);
            fields.insert("gender".to_string(), gender);
            fields.insert("address".to_string(), address);

            vault.store_record(&id, &fields, &dna)?;
            println!("🔐 Record {} encrypted and stored", id);
        }

        Commands::Retrieve { id, frame } => {
            let session = authenticate(&vault, &frame)?;

            let record = vault.retrieve_record(&session, &id)?;
            println!("📄 Record {}", record.record_id);
            println!("{:-<50}", "");
            for (name, value) in &record.fields {
                println!("{:<16} {}", name, value);
            }
            println!("{:<16} {}", "dna_sequence", record.dna_sequence);
            println!("{:<16} {}", "created_at", record.created_at);
            println!("{:<16} {}", "updated_at", record.updated_at);
        }

        Commands::Delete { id, frame } => {
            let session = authenticate(&vault, &frame)?;

            if vault.delete_record(&session, &id)? {
                println!("🗑️ Record {} deleted", id);
            } else {
                println!("📭 No record with ID {}", id);
            }
        }

        Commands::RegisterAdmin {
            name,
            contact,
            frame,
        } => {
            println!("📧 Requesting master approval...");
            let mut session = vault.begin_session();
            vault.begin_master_approval(&mut session)?;
            submit_otp(&vault, &mut session)?;

            let still = vault.capture_file(&frame)?;
            vault.register_admin(&session, &still, &name, &contact)?;
            println!("✅ Admin {} registered", name);
        }

        Commands::Log => {
            let content = vault.audit_log().read()?;
            if content.is_empty() {
                println!("📭 No verification attempts recorded");
            } else {
                print!("{}", content);
            }
        }
    }

    Ok(())
}

/// Run both factors: face match against the gallery, then the OTP sent
/// to the matched admin's contact.
fn authenticate(vault: &VaultApi, frame: &PathBuf) -> Result<AuthSession> {
    let still = vault.capture_file(frame)?;

    let mut session = vault.begin_session();
    let matched = vault.verify_face(&mut session, &still)?;
    println!(
        "👤 Face verified: {} (similarity {:.2})",
        matched.name, matched.similarity
    );

    submit_otp(vault, &mut session)?;
    Ok(session)
}

/// Prompt for the emailed OTP until it verifies or input ends
fn submit_otp(vault: &VaultApi, session: &mut AuthSession) -> Result<()> {
    let stdin = io::stdin();
    loop {
        print!("Enter OTP: ");
        io::stdout().flush()?;

        let mut code = String::new();
        if stdin.lock().read_line(&mut code)? == 0 {
            return Err(VaultError::InvalidOtp.into());
        }

        match vault.verify_otp(session, code.trim()) {
            Ok(()) => {
                println!("✅ Authenticated");
                return Ok(());
            }
            Err(VaultError::InvalidOtp) => {
                println!("❌ Invalid OTP, try again");
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Intake validation: numeric ID, plausible email, 10-digit contact,
/// non-empty name and sequence.
fn validate_intake(
    id: &str,
    full_name: &str,
    email: &str,
    contact: &str,
    dna: &str,
) -> Result<()> {
    let fail = |msg: &str| -> Result<()> { Err(VaultError::InvalidInput(msg.to_string()).into()) };

    if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
        return fail("record ID must be numeric");
    }
    if full_name.trim().is_empty() {
        return fail("full name must not be empty");
    }
    if !email.contains('@') {
        return fail("email must contain '@'");
    }
    if contact.len() != 10 || !contact.chars().all(|c| c.is_ascii_digit()) {
        return fail("contact number must be 10 digits");
    }
    if dna.trim().is_empty() {
        return fail("DNA sequence must not be empty");
    }
    Ok(())
}
