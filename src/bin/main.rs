use std::error::Error;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use synthboot::{
    boot::{BootSequence, Gate, HaltDisposition, HaltReason},
    cli::{Cli, Commands, StatusArg, parse_args},
    clock::{Clock, SystemClock},
    config::{BootConfig, ConfigFile, ConfigSource},
    constants::DEFAULT_HW_TEST_PROGRAM,
    exit_code::{Action, signal_from_status},
    launcher::{ChildSlot, ShellLauncher},
    network::{InterfaceAddress, NmcliNetwork},
    power::SystemPower,
    probe::CommandProber,
    splash::{Background, FramebufferSplash, SplashRequest, present_best_effort},
    supervisor::{Collaborators, Supervisor, SupervisorState},
};

fn main() -> Result<(), Box<dyn Error>> {
    let args = parse_args();
    init_logging(&args);

    match args.command {
        Commands::Run { config } => run(&config)?,
        Commands::Explain { status } => explain(status),
        Commands::Check { config } => check(&config)?,
    }

    Ok(())
}

fn init_logging(args: &Cli) {
    let filter = if let Some(level) = args.log_level {
        EnvFilter::new(level.as_str())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn run(config_path: &str) -> Result<(), Box<dyn Error>> {
    let source = ConfigFile::new(config_path);
    let config = source.load()?;
    info!("Loaded configuration from {}", source.path().display());

    let splash = FramebufferSplash;
    let clock = SystemClock;
    present_best_effort(&splash, &SplashRequest::Boot, &config.splash);

    let prober = CommandProber::new(
        config
            .hw_test_command
            .clone()
            .unwrap_or_else(|| DEFAULT_HW_TEST_PROGRAM.to_string()),
    );
    let mut state = SupervisorState::default();
    if let Gate::Halt(halt) =
        BootSequence::new(&splash, &prober, &clock).prepare(&config, &mut state)
    {
        match halt.disposition {
            HaltDisposition::BlockForever => {
                error!("Boot halted ({:?}); waiting for operator reboot", halt.reason);
                clock.park();
            }
            HaltDisposition::Exit => {
                return Err(match halt.reason {
                    HaltReason::HardwareTestFailed(report) => {
                        format!("hardware test failed: {report}").into()
                    }
                    reason => format!("boot halted: {reason:?}").into(),
                });
            }
        }
    }

    let mut launcher = ShellLauncher::new();
    register_signal_handler(launcher.child_slot())?;

    let network = NmcliNetwork;
    let address = InterfaceAddress;
    let power = SystemPower;
    let mut supervisor = Supervisor::new(
        Collaborators {
            config_source: &source,
            launcher: &mut launcher,
            splash: &splash,
            network: &network,
            address: &address,
            power: &power,
            clock: &clock,
        },
        config,
        state,
    );

    match supervisor.run() {
        Ok(termination) => {
            info!(
                "Session ended with {} after {} restarts",
                termination.as_ref(),
                supervisor.state().restarts
            );
            Ok(())
        }
        Err(err) => {
            error!("Supervisor stopped: {err}");
            present_best_effort(
                &splash,
                &SplashRequest::Image(Background::Error),
                &supervisor.config().splash,
            );
            Err(err.into())
        }
    }
}

fn explain(arg: StatusArg) {
    let action = Action::from_status(arg.status);
    match arg.signal {
        Some(signal) => println!("trapped {:?} -> status {}", signal, arg.status),
        None => println!("status {}", arg.status),
    }
    if let Some(signal) = signal_from_status(arg.status) {
        println!("killed by {signal}");
    }
    println!("action: {action}");
    if let Action::RecoveryFallback(label) = &action {
        println!("label: {label}");
    }
}

fn check(config_path: &str) -> Result<(), Box<dyn Error>> {
    let config = ConfigFile::new(config_path).load()?;
    print_summary(&config);
    Ok(())
}

fn print_summary(config: &BootConfig) {
    println!("project dir:      {}", config.project_dir.display());
    println!("ui command:       {}", config.ui.command);
    println!("ui working dir:   {}", config.ui.working_dir.display());
    println!("restart delay:    {:?}", config.timings.restart_delay);
    println!(
        "hardware test:    {}",
        config.hw_test.as_deref().unwrap_or("disabled")
    );
    println!("control test:     {}", config.control_test);
    println!(
        "first boot:       {} ({})",
        config.first_boot_marker.display(),
        if config.first_boot_marker.exists() {
            "pending"
        } else {
            "done"
        }
    );
    println!(
        "recovery network: {} (below {} active)",
        config.network.recovery_connection, config.network.max_active_connections
    );
    println!("splash enabled:   {}", config.splash.enabled);
    if let Some(driver) = &config.driver {
        println!(
            "driver:           {} ({})",
            driver.artifact.display(),
            if driver.artifact.exists() {
                "present"
            } else {
                "missing"
            }
        );
    }
    println!("child env vars:   {}", config.child_env().len());
}

fn register_signal_handler(child: ChildSlot) -> Result<(), Box<dyn Error>> {
    ctrlc::set_handler(move || {
        warn!("synthboot is shutting down... stopping the UI");
        child.terminate();
        std::process::exit(0);
    })?;

    Ok(())
}
