use apr_core::{
    monthly_summaries, technique, AirwayDevice, BiologicalSex, NewPatient, NewProcedure,
    NonEmptyText, PatientService, ProcedureKind, ProcedureLive, ProcedureMutations,
    ProcedureService, ProcedureStatus, RecordId, SummaryFilter, TechniqueKind, TechniqueSelection,
};
use apr_store::{DocumentStore, FileStore};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "apr")]
#[command(about = "APR anaesthesia procedure record CLI")]
struct Cli {
    /// Data directory (defaults to $APR_DATA_DIR, then ./apr_data)
    #[arg(long)]
    data_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List all patients
    ListPatients,
    /// Register a new patient (intake)
    Intake {
        /// Full name
        name: String,
        /// Date of birth (YYYY-MM-DD)
        birth_date: String,
        /// Biological sex (female or male)
        sex: String,
        /// National health-card number (optional)
        #[arg(long)]
        health_card: Option<String>,
    },
    /// Register a procedure under a patient
    RegisterProcedure {
        /// Patient identifier
        patient_id: String,
        /// Hospital name
        hospital: String,
        /// Billing kind (public_system or insurance)
        #[arg(long, default_value = "insurance")]
        kind: String,
        /// Responsible surgeon (repeatable)
        #[arg(long = "surgeon", required = true)]
        surgeons: Vec<String>,
        /// Scheduled date and time (RFC 3339; defaults to now)
        #[arg(long)]
        scheduled_for: Option<String>,
        /// Free-text description
        #[arg(long)]
        description: Option<String>,
    },
    /// Show the settled aggregate view of a procedure
    Show {
        /// Patient identifier
        patient_id: String,
        /// Procedure identifier
        procedure_id: String,
    },
    /// Transition a procedure's lifecycle status
    SetStatus {
        /// Patient identifier
        patient_id: String,
        /// Procedure identifier
        procedure_id: String,
        /// Target status (scheduled, in_progress, completed, cancelled)
        status: String,
    },
    /// Monthly billing totals for a patient
    Monthly {
        /// Patient identifier
        patient_id: String,
        /// Restrict to insurance-billed procedures
        #[arg(long)]
        insurance_only: bool,
    },
    /// Assemble an anaesthesia technique description
    Describe {
        /// Technique kind (general, spinal, epidural, sedation, local)
        kind: String,
        /// Airway device (face_mask, laryngeal_mask, tracheal_tube)
        #[arg(long)]
        airway: Option<String>,
        /// Induction agent (repeatable)
        #[arg(long = "agent")]
        agents: Vec<String>,
        /// Maintenance agent
        #[arg(long)]
        maintenance: Option<String>,
        /// Local anaesthetic
        #[arg(long)]
        local: Option<String>,
        /// Puncture level (e.g. L3-L4)
        #[arg(long)]
        level: Option<String>,
    },
}

/// Parses a wire enum through its serde representation.
fn parse_wire<T: serde::de::DeserializeOwned>(value: &str) -> Option<T> {
    serde_json::from_value(serde_json::Value::String(value.to_owned())).ok()
}

fn open_store(data_dir: Option<PathBuf>) -> Result<Arc<dyn DocumentStore>, Box<dyn std::error::Error>> {
    let dir = data_dir
        .or_else(|| std::env::var_os("APR_DATA_DIR").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("apr_data"));
    std::fs::create_dir_all(&dir)?;
    Ok(Arc::new(FileStore::open(&dir)?))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("Use 'apr --help' for commands");
        return Ok(());
    };

    let store = open_store(cli.data_dir)?;

    match command {
        Commands::ListPatients => {
            let patients = PatientService::new(store).list_patients().await?;
            if patients.is_empty() {
                println!("No patients found.");
            } else {
                for patient in patients {
                    println!(
                        "ID: {}, Name: {}, Born: {}, Sex: {}",
                        patient.id,
                        patient.name,
                        patient.birth_date,
                        patient.sex.as_str()
                    );
                }
            }
        }
        Commands::Intake {
            name,
            birth_date,
            sex,
            health_card,
        } => {
            let intake = NewPatient {
                name: NonEmptyText::new(&name)?,
                birth_date: NaiveDate::parse_from_str(&birth_date, "%Y-%m-%d")?,
                sex: BiologicalSex::parse(&sex)
                    .ok_or("sex must be 'female' or 'male'")?,
                health_card_number: health_card,
            };
            match PatientService::new(store).create_patient(intake).await {
                Ok(patient) => println!("Created patient with ID: {}", patient.id),
                Err(e) => eprintln!("Error creating patient: {e}"),
            }
        }
        Commands::RegisterProcedure {
            patient_id,
            hospital,
            kind,
            surgeons,
            scheduled_for,
            description,
        } => {
            let patient_id = RecordId::new(&patient_id)?;
            let scheduled_for = match scheduled_for {
                Some(value) => DateTime::parse_from_rfc3339(&value)?.with_timezone(&Utc),
                None => Utc::now(),
            };
            let registration = NewProcedure {
                kind: ProcedureKind::parse(&kind)
                    .ok_or("kind must be 'public_system' or 'insurance'")?,
                hospital: NonEmptyText::new(&hospital)?,
                surgeons: surgeons
                    .iter()
                    .map(NonEmptyText::new)
                    .collect::<Result<_, _>>()?,
                billing: vec![],
                description,
                scheduled_for,
            };
            match ProcedureService::new(store).register(&patient_id, registration).await {
                Ok(procedure) => println!("Registered procedure with ID: {}", procedure.id),
                Err(e) => eprintln!("Error registering procedure: {e}"),
            }
        }
        Commands::Show {
            patient_id,
            procedure_id,
        } => {
            let live = ProcedureLive::new(store);
            let mut handle = live.subscribe(&patient_id, &procedure_id)?;
            let aggregate = handle.settled().await;
            handle.shutdown();

            if let Some(error) = &aggregate.error {
                eprintln!("Error: {error}");
                return Ok(());
            }
            if let Some(patient) = &aggregate.patient {
                println!("Patient:   {} ({})", patient.name, patient.id);
            }
            if let Some(procedure) = &aggregate.procedure {
                println!(
                    "Procedure: {} at {} [{}], revision {}",
                    procedure.id,
                    procedure.hospital,
                    procedure.status.as_str(),
                    procedure.revision
                );
            }
            println!(
                "Records:   surgery={} pre-anaesthetic={} pacu={}",
                presence(aggregate.surgery.is_some()),
                presence(aggregate.pre_anaesthetic.is_some()),
                presence(aggregate.pacu.is_some()),
            );
            println!(
                "Status:    {} ({}/3 records)",
                aggregate.status.overall.as_str(),
                aggregate.status.present_count
            );
        }
        Commands::SetStatus {
            patient_id,
            procedure_id,
            status,
        } => {
            let status = ProcedureStatus::parse(&status)
                .ok_or("status must be scheduled, in_progress, completed or cancelled")?;
            let mutations = ProcedureMutations::new(store, &patient_id, &procedure_id)?;
            match mutations.set_status(status).await {
                Ok(()) => println!("Status set to {}", status.as_str()),
                Err(e) => eprintln!("Error setting status: {e}"),
            }
        }
        Commands::Monthly {
            patient_id,
            insurance_only,
        } => {
            let patient_id = RecordId::new(&patient_id)?;
            let procedures = ProcedureService::new(store)
                .list_for_patient(&patient_id)
                .await?;
            let summaries = monthly_summaries(&procedures, SummaryFilter { insurance_only });
            if summaries.is_empty() {
                println!("No procedures found.");
            } else {
                for summary in summaries {
                    println!(
                        "{}: {} procedure(s), billed {:.2}, received {:.2}",
                        summary.month,
                        summary.procedures,
                        summary.total_billed,
                        summary.total_received
                    );
                }
            }
        }
        Commands::Describe {
            kind,
            airway,
            agents,
            maintenance,
            local,
            level,
        } => {
            let selection = TechniqueSelection {
                kind: parse_wire::<TechniqueKind>(&kind)
                    .ok_or("kind must be general, spinal, epidural, sedation or local")?,
                airway: airway
                    .as_deref()
                    .map(|value| {
                        parse_wire::<AirwayDevice>(value)
                            .ok_or("airway must be face_mask, laryngeal_mask or tracheal_tube")
                    })
                    .transpose()?,
                induction_agents: agents
                    .iter()
                    .map(NonEmptyText::new)
                    .collect::<Result<_, _>>()?,
                maintenance_agent: maintenance.as_deref().map(NonEmptyText::new).transpose()?,
                local_anaesthetic: local.as_deref().map(NonEmptyText::new).transpose()?,
                puncture_level: level.as_deref().map(NonEmptyText::new).transpose()?,
            };
            println!("{}", technique::describe(&selection));
        }
    }

    Ok(())
}

fn presence(present: bool) -> &'static str {
    if present {
        "yes"
    } else {
        "no"
    }
}
