use super::*;

#[test]
fn no_command_is_none() {
    let cli = Cli::try_parse_from(["vcat-cli"]).expect("expected valid cli args");
    assert!(cli.command.is_none());
}

#[test]
fn parses_db_migrate_command() {
    let cli = Cli::try_parse_from(["vcat-cli", "db", "migrate"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Migrate
        })
    ));
}

#[test]
fn import_defaults_to_a_real_run_from_the_configured_directory() {
    let cli = Cli::try_parse_from(["vcat-cli", "import"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Import {
            dry_run: false,
            dir: None
        })
    ));
}

#[test]
fn import_accepts_dry_run_and_directory() {
    let cli = Cli::try_parse_from(["vcat-cli", "import", "--dry-run", "--dir", "/tmp/drop"])
        .expect("expected valid cli args");

    match cli.command {
        Some(Commands::Import { dry_run, dir }) => {
            assert!(dry_run);
            assert_eq!(dir, Some(PathBuf::from("/tmp/drop")));
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn reconcile_parses_policy_override() {
    let cli = Cli::try_parse_from(["vcat-cli", "reconcile", "--policy", "archive"])
        .expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Reconcile {
            policy: Some(StalePolicy::Archive)
        })
    ));
}

#[test]
fn reconcile_rejects_unknown_policy() {
    let result = Cli::try_parse_from(["vcat-cli", "reconcile", "--policy", "delete"]);
    assert!(result.is_err());
}

#[test]
fn status_limit_defaults_to_ten() {
    let cli = Cli::try_parse_from(["vcat-cli", "status"]).expect("expected valid cli args");
    assert!(matches!(cli.command, Some(Commands::Status { limit: 10 })));
}
