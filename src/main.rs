use clap::{Arg, ArgAction, Command};
use dorkgen::command_router::{render, Action, CommandRouter, Reply};
use dorkgen::config::Config;
use std::io::{self, Write};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let matches = Command::new("dork")
        .about("Generate Google dorks from plain-language descriptions with Gemini")
        .arg(Arg::new("description")
            .help("What you are looking for")
            .num_args(1..))
        .arg(Arg::new("refine")
            .long("refine")
            .short('r')
            .help("Refine the most recent dork using the description as the new goal")
            .action(ArgAction::SetTrue))
        .arg(Arg::new("from")
            .long("from")
            .help("Dork to refine instead of the most recent one")
            .value_name("DORK")
            .requires("refine"))
        .arg(Arg::new("copy")
            .long("copy")
            .short('c')
            .help("Copy the generated dork to the clipboard")
            .action(ArgAction::SetTrue))
        .arg(Arg::new("interactive")
            .long("interactive")
            .short('i')
            .help("Start an interactive session")
            .action(ArgAction::SetTrue))
        .arg(Arg::new("set-api-key")
            .long("set-api-key")
            .help("Save the Gemini API key (an empty value removes it)")
            .value_name("API_KEY")
            .num_args(1))
        .arg(Arg::new("history")
            .long("history")
            .help("List previously generated dorks")
            .action(ArgAction::SetTrue))
        .arg(Arg::new("clear-history")
            .long("clear-history")
            .help("Remove all saved dorks")
            .action(ArgAction::SetTrue))
        .arg(Arg::new("config")
            .long("config")
            .help("Show configuration information")
            .action(ArgAction::SetTrue))
        .get_matches();

    if matches.get_flag("config") {
        Config::show_config_info()?;
        return Ok(());
    }

    let config = Config::load()?;
    let mut router = CommandRouter::from_config(&config)?;
    let mut stdout = io::stdout();

    if let Some(api_key) = matches.get_one::<String>("set-api-key") {
        let reply = router.handle(Action::SaveKey(api_key.clone())).await?;
        render(&reply, &mut stdout)?;
        return Ok(());
    }

    if matches.get_flag("clear-history") {
        let reply = router.handle(Action::ClearHistory).await?;
        render(&reply, &mut stdout)?;
        return Ok(());
    }

    if matches.get_flag("history") {
        let reply = router.handle(Action::ShowHistory).await?;
        render(&reply, &mut stdout)?;
        return Ok(());
    }

    if matches.get_flag("interactive") {
        let stdin = io::stdin();
        router.run_session_with_io(&mut stdin.lock(), &mut stdout).await?;
        return Ok(());
    }

    let description = matches
        .get_many::<String>("description")
        .unwrap_or_default()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    info!("Processing description: {:?}", description);

    let action = if matches.get_flag("refine") {
        let previous = match matches.get_one::<String>("from") {
            Some(dork) => Some(dork.clone()),
            None => router.orchestrator().history().list().into_iter().next(),
        };
        router.orchestrator_mut().set_current_result(previous);
        Action::Refine(description)
    } else {
        Action::Generate(description)
    };

    let reply = router.handle(action).await?;
    exit_on_failure(&reply)?;
    render(&reply, &mut stdout)?;

    if matches.get_flag("copy") {
        let reply = router.handle(Action::Copy).await?;
        exit_on_failure(&reply)?;
        render(&reply, &mut stdout)?;
    }

    Ok(())
}

fn exit_on_failure(reply: &Reply) -> anyhow::Result<()> {
    if reply.is_failure() {
        let mut stderr = io::stderr();
        render(reply, &mut stderr)?;
        stderr.flush()?;
        std::process::exit(1);
    }
    Ok(())
}
