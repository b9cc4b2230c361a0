use clap::Parser;
use std::path::{Path, PathBuf};
use voucher_desk::config::cli::{AgencyCommand, AgentCommand, Command, MaskKind, VoucherCommand};
use voucher_desk::core::store::Collection;
use voucher_desk::core::template_scaffold::voucher_template;
use voucher_desk::domain::model::{AgentKind, Voucher};
use voucher_desk::domain::ports::Storage;
use voucher_desk::utils::format::{mask_cnpj, mask_cpf, mask_phone, safe_file_component};
use voucher_desk::utils::{logger, validation::Validate};
use voucher_desk::{
    AgencyBook, AgentRoster, AppConfig, CliConfig, LocalStorage, RecordStore, Result, VoucherBook,
    VoucherError, VoucherExporter, VoucherForm,
};

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let cli = CliConfig::parse();

    logger::init_cli_logger(cli.verbose);
    tracing::debug!("CLI arguments: {:?}", cli);

    if let Err(e) = run(cli).await {
        tracing::error!(
            "❌ Command failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

        std::process::exit(e.severity().exit_code());
    }

    Ok(())
}

async fn run(cli: CliConfig) -> Result<()> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(data_dir) = cli.data_dir {
        config.storage.data_dir = data_dir;
        config.validate()?;
    }

    let store = RecordStore::new(LocalStorage::new(&config.storage.data_dir));

    match cli.command {
        Command::Status => status(&store).await,
        Command::Agency(command) => agency(&store, command).await,
        Command::Agent(command) => agent(&store, command).await,
        Command::Voucher(command) => voucher(&store, &config, command).await,
        Command::Suggest { field, query } => {
            let dictionary = VoucherBook::new(&store).autocomplete().await?;
            for suggestion in dictionary.suggestions(&field, &query) {
                println!("{}", suggestion);
            }
            Ok(())
        }
        Command::Mask { kind, value } => {
            let masked = match kind {
                MaskKind::Cpf => mask_cpf(&value),
                MaskKind::Cnpj => mask_cnpj(&value),
                MaskKind::Phone => mask_phone(&value),
            };
            println!("{}", masked);
            Ok(())
        }
    }
}

async fn status<S: Storage>(store: &RecordStore<S>) -> Result<()> {
    let agencies = AgencyBook::new(store).list().await?;
    let templates: usize = agencies.iter().map(|a| a.templates.len()).sum();
    let vouchers = VoucherBook::new(store).list().await?;
    let profile = AgentRoster::new(store).profile().await?;

    println!("🏢 Agencies:  {}", agencies.len());
    println!("📄 Templates: {}", templates);
    println!("🎫 Vouchers:  {}", vouchers.len());
    println!("👥 Agents:    {}", profile.agents.len());
    if agencies.is_empty() {
        println!("💡 Add an agency with a PDF template before creating vouchers");
    }
    Ok(())
}

async fn agency<S: Storage>(store: &RecordStore<S>, command: AgencyCommand) -> Result<()> {
    let book = AgencyBook::new(store);
    match command {
        AgencyCommand::Add {
            name,
            template,
            blank,
        } => {
            let (file_name, data) = match (template, blank) {
                (Some(path), _) => (file_name_of(&path), tokio::fs::read(&path).await?),
                (None, true) => (
                    format!("{}.pdf", safe_file_component(&name)),
                    voucher_template(&name)?,
                ),
                (None, false) => {
                    return Err(VoucherError::MissingConfigError {
                        field: "--template or --blank".to_string(),
                    })
                }
            };
            let (agency, template) = book.add_template(&name, &file_name, data).await?;
            println!(
                "✅ Template '{}' saved for agency '{}' ({} templates)",
                template.name,
                agency.name,
                agency.templates.len()
            );
            println!("   agency id:   {}", agency.id);
            println!("   template id: {}", template.id);
        }
        AgencyCommand::List => {
            let agencies = book.list().await?;
            if agencies.is_empty() {
                println!("No agencies configured");
            }
            for agency in agencies {
                println!("🏢 {}  {}", agency.id, agency.name);
                for template in &agency.templates {
                    println!(
                        "   📄 {}  {}  (uploaded {})",
                        template.id,
                        template.name,
                        template.uploaded_at.format("%d-%m-%Y")
                    );
                }
            }
        }
        AgencyCommand::Remove { id } => {
            let removed = book.remove(&id).await?;
            println!("✅ Agency '{}' removed", removed.name);
        }
        AgencyCommand::Scaffold { out, title } => {
            let bytes = voucher_template(&title)?;
            tokio::fs::write(&out, &bytes).await?;
            println!("✅ Blank template written to {}", out.display());
        }
    }
    Ok(())
}

async fn agent<S: Storage>(store: &RecordStore<S>, command: AgentCommand) -> Result<()> {
    let roster = AgentRoster::new(store);
    match command {
        AgentCommand::Add {
            name,
            email,
            phone,
            admin,
        } => {
            let kind = if admin {
                AgentKind::Admin
            } else {
                AgentKind::Agent
            };
            let agent = roster.add(&name, &email, &phone, kind).await?;
            println!("✅ {} '{}' added ({})", agent.kind.label(), agent.name, agent.id);
        }
        AgentCommand::Rename { id, name } => {
            let agent = roster.rename(&id, &name).await?;
            println!("✅ Agent is now '{}'", agent.name);
        }
        AgentCommand::Remove { id } => {
            let agent = roster.remove(&id).await?;
            println!("✅ Agent '{}' removed", agent.name);
        }
        AgentCommand::List => {
            let profile = roster.profile().await?;
            if profile.agents.is_empty() {
                println!("No agents registered");
            }
            for agent in profile.agents {
                println!(
                    "👤 {}  {}  <{}>  {}  [{}]",
                    agent.id,
                    agent.name,
                    agent.email,
                    agent.phone,
                    agent.kind.label()
                );
            }
        }
    }
    Ok(())
}

async fn voucher<S: Storage>(
    store: &RecordStore<S>,
    config: &AppConfig,
    command: VoucherCommand,
) -> Result<()> {
    let book = VoucherBook::new(store);
    match command {
        VoucherCommand::Save { input, edit } => {
            ensure_agencies(store).await?;
            let form = read_form(&input.form).await?;
            let saved = book.save(&form, edit.as_deref()).await?;
            let verb = if edit.is_some() { "updated" } else { "saved" };
            println!("✅ Voucher {} {}", saved.id, verb);
        }
        VoucherCommand::List => {
            let summaries = book.summaries().await?;
            if summaries.is_empty() {
                println!("No vouchers yet");
            }
            for s in summaries {
                println!("🎫 {}  {}  ({})", s.id, s.contractor_name, s.created_on);
                println!("   Agent: {}", s.agent);
                println!("   Destinations: {}", s.destinations);
                println!(
                    "   Passengers: {}  Total: {}  Remaining: {}",
                    s.total_passengers, s.total, s.remaining
                );
            }
        }
        VoucherCommand::Show { id } => {
            let voucher = book.get(&id).await?;
            println!("{}", serde_json::to_string_pretty(&voucher)?);
        }
        VoucherCommand::Delete { id } => {
            if !book.delete(&id).await? {
                return Err(VoucherError::NotFound {
                    entity: "Voucher",
                    id,
                });
            }
            println!("✅ Voucher {} deleted", id);
        }
        VoucherCommand::Export { id, out } => {
            let voucher = book.get(&id).await?;
            write_pdf(store, config, &voucher, out).await?;
        }
        VoucherCommand::Preview { input, out } => {
            ensure_agencies(store).await?;
            let data = read_form(&input.form).await?.to_data();
            data.validate().map_err(VoucherError::Validation)?;
            let draft = data.into_voucher("preview".to_string(), chrono::Utc::now(), None);
            write_pdf(store, config, &draft, out).await?;
        }
    }
    Ok(())
}

async fn write_pdf<S: Storage>(
    store: &RecordStore<S>,
    config: &AppConfig,
    voucher: &Voucher,
    out: Option<PathBuf>,
) -> Result<()> {
    let output_dir = out.unwrap_or_else(|| PathBuf::from(&config.export.output_dir));
    let output = LocalStorage::new(&output_dir);
    let rendered = VoucherExporter::new(store).export_to(voucher, &output).await?;

    if !rendered.report.missing.is_empty() {
        println!(
            "⚠️  Template has no field for: {}",
            rendered.report.missing.join(", ")
        );
    }
    println!(
        "✅ PDF written to {}",
        output_dir.join(&rendered.file_name).display()
    );
    Ok(())
}

async fn ensure_agencies<S: Storage>(store: &RecordStore<S>) -> Result<()> {
    let agencies = store.get::<serde_json::Value>(Collection::Agencies).await?;
    if agencies.is_empty() {
        return Err(VoucherError::ConfigError {
            message: "Register at least one agency before creating vouchers".to_string(),
        });
    }
    Ok(())
}

async fn read_form(path: &Path) -> Result<VoucherForm> {
    let raw = tokio::fs::read(path).await?;
    Ok(serde_json::from_slice(&raw)?)
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
