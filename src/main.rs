//! LLM Workbench CLI
//!
//! Line-oriented front end over a single [`Workspace`].

use std::path::PathBuf;

use tokio::io::{AsyncBufReadExt, BufReader};

use workbench::config::{Config, Validate};
use workbench::generation::backend_for;
use workbench::{Diff, Workspace};

const HELP: &str = "\
Commands:
  root <path>                 activate a project directory
  files                       list project files
  cat <path>                  print a project file
  new <file> <instructions>   generate a new file
  modify <file> <instructions>  propose a change and show the diff
  confirm <file>              apply the pending change
  cancel <file>               discard the pending change
  pending                     list files with pending changes
  sync                        summarize the project
  chat <message>              talk about the project
  help                        show this message
  quit                        exit";

/// One parsed input line.
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Root(String),
    Files,
    Cat(String),
    New { file: String, instructions: String },
    Modify { file: String, instructions: String },
    Confirm(String),
    Cancel(String),
    Pending,
    Sync,
    Chat(String),
    Help,
    Quit,
}

impl Command {
    fn parse(line: &str) -> Result<Option<Self>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };

        let arg = |what: &str| {
            if rest.is_empty() {
                Err(format!("usage: {} <{}>", verb, what))
            } else {
                Ok(rest.to_string())
            }
        };
        let file_and_text = || match rest.split_once(char::is_whitespace) {
            Some((file, text)) => Ok((file.to_string(), text.trim().to_string())),
            None if !rest.is_empty() => Ok((rest.to_string(), String::new())),
            None => Err(format!("usage: {} <file> <instructions>", verb)),
        };

        let command = match verb {
            "root" => Command::Root(arg("path")?),
            "files" | "ls" => Command::Files,
            "cat" => Command::Cat(arg("path")?),
            "new" => {
                let (file, instructions) = file_and_text()?;
                Command::New { file, instructions }
            }
            "modify" => {
                let (file, instructions) = file_and_text()?;
                Command::Modify { file, instructions }
            }
            "confirm" => Command::Confirm(arg("file")?),
            "cancel" => Command::Cancel(arg("file")?),
            "pending" => Command::Pending,
            "sync" => Command::Sync,
            "chat" => Command::Chat(arg("message")?),
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => return Err(format!("unknown command '{}', try 'help'", other)),
        };
        Ok(Some(command))
    }
}

async fn run(workspace: &mut Workspace, command: Command) -> workbench::Result<()> {
    match command {
        Command::Root(path) => {
            let activation = workspace.activate_project(&path)?;
            println!("Project root set to {}", activation.root.display());
            if activation.history_loaded {
                println!("Previous conversation history loaded.");
            }
        }
        Command::Files => {
            for file in workspace.list_files()? {
                println!("{}", file);
            }
        }
        Command::Cat(path) => {
            println!("{}", workspace.read_file(&path)?);
        }
        Command::New { file, instructions } => {
            let written = workspace.generate_new(&file, &instructions).await?;
            println!("Wrote {} ({} bytes)", written.path, written.bytes);
        }
        Command::Modify { file, instructions } => {
            match workspace.propose_modification(&file, &instructions).await? {
                Diff::Identical => println!("No differences."),
                Diff::Unified(text) => print!("{}", text),
            }
            println!("Use 'confirm {}' to apply or 'cancel {}' to discard.", file, file);
        }
        Command::Confirm(file) => {
            let written = workspace.confirm_modification(&file)?;
            println!("Applied changes to {}", written.path);
        }
        Command::Cancel(file) => {
            let cancelled = workspace.cancel_modification(&file)?;
            if cancelled.discarded {
                println!("Discarded pending changes to {}", cancelled.path);
            } else {
                println!("Nothing pending for {}", cancelled.path);
            }
        }
        Command::Pending => match workspace.session() {
            Some(session) => {
                for path in session.pending_paths() {
                    println!("{}", path);
                }
            }
            None => return Err(workbench::Error::NotActivated),
        },
        Command::Sync => {
            let sync = workspace.sync_project().await?;
            println!(
                "Analyzed {} of {} files.\n\n{}",
                sync.files_analyzed, sync.total_files, sync.summary
            );
        }
        Command::Chat(message) => {
            println!("{}", workspace.chat(&message).await?);
        }
        Command::Help => println!("{}", HELP),
        Command::Quit => {}
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config_path = PathBuf::from(
        std::env::var("WORKBENCH_CONFIG").unwrap_or_else(|_| "workbench.toml".to_string()),
    );

    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {}: {}", config_path.display(), e);
            std::process::exit(1);
        }
    };

    match config.validate().into_result() {
        Ok(warnings) => {
            for warning in warnings {
                tracing::warn!(warning = %warning, "configuration warning");
            }
        }
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }

    let backend = match backend_for(&config.generation) {
        Ok(backend) => backend,
        Err(e) => {
            eprintln!("Failed to set up generation backend: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!(backend = %backend.name(), model = %config.generation.model, "starting workbench");
    let mut workspace = Workspace::new(config, backend);

    if let Some(root) = std::env::args().nth(1) {
        if let Err(e) = run(&mut workspace, Command::Root(root)).await {
            eprintln!("Error: {}", e);
        }
    }

    println!("Type 'help' for commands.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                eprintln!("Failed to read input: {}", e);
                std::process::exit(1);
            }
        };

        let command = match Command::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(usage) => {
                eprintln!("{}", usage);
                continue;
            }
        };
        if command == Command::Quit {
            break;
        }

        if let Err(e) = run(&mut workspace, command).await {
            if e.is_client_error() {
                eprintln!("Error: {}", e);
            } else {
                tracing::error!(error = %e, "operation failed");
                eprintln!("Server error: {}", e);
            }
        }
    }
}
