use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;

use licita_cli::{read_form, render, App};
use licita_common::{telemetry, LicitaConfig, Role};
use licita_security::{Action, BuyerRegistration, RecordCategory, SupplierRegistration};

#[derive(Parser)]
#[command(name = "licitactl")]
#[command(about = "Licita bid portal client", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(short, long, env = "LICITA_CONFIG", default_value = "config/licita.toml")]
    config: PathBuf,

    /// Overrides the configured data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a session
    Login {
        #[arg(short, long)]
        email: String,
        #[arg(short, long, env = "LICITA_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Close the session
    Logout {
        /// Page the user is on
        #[arg(long, default_value = "/sistema-gestao.html")]
        page: String,
    },
    /// Show the session principal
    Whoami,
    /// Run the page gate for a path
    Check {
        path: String,
        /// Roles the page admits; none means any session
        #[arg(short, long)]
        role: Vec<Role>,
    },
    /// Look up a permission
    Can {
        action: Action,
        /// Query the matrix for this role instead of the session
        #[arg(short, long)]
        role: Option<Role>,
    },
    /// Show the local access log
    Activity {
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },
    /// Register an account from a JSON file
    Register {
        #[command(subcommand)]
        kind: RegisterKind,
    },
    /// Print the computed schedule of a form
    Schedule { form: PathBuf },
    /// Print the commercial totals of a form
    Totals { form: PathBuf },
    /// Print the document a form would submit
    Assemble { form: PathBuf },
    /// Validate, check for duplicates and submit a form
    Submit { form: PathBuf },
    /// List records visible to the session
    List {
        /// processos | propostas
        category: RecordCategory,
        /// Restrict proposals to one process
        #[arg(long)]
        process: Option<String>,
    },
    /// Manage the draft slot
    Draft {
        #[command(subcommand)]
        action: DraftAction,
    },
    /// Watch the session and auto-save a form until expiry or Ctrl-C
    Watch {
        #[arg(long)]
        form: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum RegisterKind {
    Supplier { file: PathBuf },
    Buyer { file: PathBuf },
}

#[derive(Subcommand)]
enum DraftAction {
    Save { form: PathBuf },
    Show,
    Clear,
}

fn read_json<T: serde::de::DeserializeOwned>(path: &PathBuf) -> anyhow::Result<T> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {:?}", path))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = LicitaConfig::load_or_default(Some(&cli.config))?;
    if let Some(dir) = &cli.data_dir {
        config.storage.data_dir = dir.clone();
    }
    telemetry::init(&config.log)?;

    let app = App::open(config)?;

    match &cli.command {
        Commands::Login { email, password } => {
            println!("{}", app.login(email, password).await?);
        }
        Commands::Logout { page } => {
            println!("{}", app.logout(page).await);
        }
        Commands::Whoami => {
            println!("{}", app.whoami()?);
        }
        Commands::Check { path, role } => {
            println!("{}", app.check(path, role));
        }
        Commands::Can { action, role } => {
            let allowed = app.can(*action, *role)?;
            println!("{}: {}", action, if allowed { "allowed" } else { "denied" });
        }
        Commands::Activity { limit } => {
            println!("{}", app.activity(*limit));
        }
        Commands::Register { kind } => match kind {
            RegisterKind::Supplier { file } => {
                let registration: SupplierRegistration = read_json(file)?;
                println!("{}", app.register_supplier(&registration).await?);
            }
            RegisterKind::Buyer { file } => {
                let registration: BuyerRegistration = read_json(file)?;
                println!("{}", app.register_buyer(&registration).await?);
            }
        },
        Commands::Schedule { form } => {
            println!("{}", render::schedule(&read_form(form)?.compute_schedule()));
        }
        Commands::Totals { form } => {
            println!("{}", render::totals(&read_form(form)?.compute_totals()));
        }
        Commands::Assemble { form } => {
            println!("{}", app.assemble(&read_form(form)?)?);
        }
        Commands::Submit { form } => {
            println!("{}", licita_common::messages::SUBMITTING);
            let outcome = app.submit(&read_form(form)?).await?;
            println!("{}", outcome.message());
        }
        Commands::List { category, process } => {
            println!("{}", app.list(category, process.clone()).await?);
        }
        Commands::Draft { action } => match action {
            DraftAction::Save { form } => {
                app.save_draft(&read_form(form)?)?;
                println!("Rascunho salvo");
            }
            DraftAction::Show => match app.show_draft()? {
                Some(draft) => println!("{}", draft),
                None => println!("Nenhum rascunho salvo"),
            },
            DraftAction::Clear => {
                app.clear_draft()?;
                println!("Rascunho removido");
            }
        },
        Commands::Watch { form } => {
            let form = form.as_ref().map(|p| read_form(p)).transpose()?;
            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Interrupted, stopping watch");
                    on_signal.cancel();
                }
            });
            println!("{}", app.watch(form, cancel).await);
        }
    }

    Ok(())
}
