//! Live change feed: print every `NotifyList` delta until Ctrl-C.

use owo_colors::OwoColorize;
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;

use intellicenter_core::{
    ConnectionState, Controller, ControllerConfig, LifecycleEvent, ModelUpdate, PoolModel, Supervisor,
};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

// ── Printer ─────────────────────────────────────────────────────────

struct Printer {
    format: OutputFormat,
    color: bool,
    quiet: bool,
    objtype: Option<String>,
}

impl Printer {
    fn new(args: &WatchArgs, global: &GlobalOpts) -> Self {
        Self {
            format: global.output,
            color: output::should_color(global.color),
            quiet: global.quiet,
            objtype: args.objtype.as_deref().map(str::to_ascii_uppercase),
        }
    }

    fn wanted(&self, model: &PoolModel, objnam: &str) -> bool {
        self.objtype
            .as_deref()
            .is_none_or(|t| model.get(objnam).is_some_and(|o| o.objtype() == t))
    }

    fn update(&self, update: &ModelUpdate, model: &PoolModel) -> Result<(), CliError> {
        let changes: Vec<_> = update
            .changes
            .iter()
            .filter(|(objnam, _)| self.wanted(model, objnam))
            .collect();
        if changes.is_empty() {
            return Ok(());
        }

        let out = match self.format {
            OutputFormat::Json | OutputFormat::JsonCompact => {
                let changes: serde_json::Map<_, _> = changes
                    .iter()
                    .map(|(objnam, attrs)| ((*objnam).clone(), json!(attrs)))
                    .collect();
                output::render_json(
                    &json!({ "time": update.received_at.to_rfc3339(), "changes": changes }),
                    true,
                )?
            }
            OutputFormat::Table | OutputFormat::Plain => {
                let time = update.received_at.with_timezone(&chrono::Local).format("%H:%M:%S");
                changes
                    .iter()
                    .map(|(objnam, attrs)| {
                        let attrs = attrs
                            .iter()
                            .map(|(k, v)| format!("{k}={v}"))
                            .collect::<Vec<_>>()
                            .join(" ");
                        if self.color {
                            format!("{} {} {attrs}", time.dimmed(), objnam.cyan())
                        } else {
                            format!("{time} {objnam} {attrs}")
                        }
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            }
        };
        output::print_output(&out, self.quiet);
        Ok(())
    }

    fn event(&self, event: LifecycleEvent) {
        if self.quiet {
            return;
        }
        let text = event.to_string();
        match (self.color, event) {
            (true, LifecycleEvent::Started | LifecycleEvent::Reconnected) => eprintln!("{}", text.green()),
            (true, LifecycleEvent::Disconnected) => eprintln!("{}", text.red()),
            (true, LifecycleEvent::Retrying { .. }) => eprintln!("{}", text.yellow()),
            (false, _) => eprintln!("{text}"),
        }
    }
}

// ── Handlers ────────────────────────────────────────────────────────

pub async fn handle(config: ControllerConfig, args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let printer = Printer::new(&args, global);
    if args.reconnect {
        supervised(config, &printer).await
    } else {
        single(config, &printer).await
    }
}

/// One session; losing it is an error.
async fn single(config: ControllerConfig, printer: &Printer) -> Result<(), CliError> {
    let controller = super::connect(config).await?;
    printer.event(LifecycleEvent::Started);

    let mut updates = controller.updates();
    let mut state = controller.connection_state();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let result = loop {
        tokio::select! {
            _ = &mut shutdown => break Ok(()),
            () = lost(&mut state) => break Err(CliError::Disconnected {
                reason: "appliance closed the connection".into(),
            }),
            update = updates.recv() => match update {
                Ok(update) => {
                    if let Err(e) = printer.update(&update, &controller.model()) {
                        break Err(e);
                    }
                }
                Err(RecvError::Lagged(skipped)) => tracing::warn!(skipped, "change feed fell behind"),
                Err(RecvError::Closed) => break Ok(()),
            },
        }
    };

    controller.stop().await;
    result
}

/// Reconnect forever, reporting lifecycle events on stderr.
async fn supervised(config: ControllerConfig, printer: &Printer) -> Result<(), CliError> {
    let reconnect = config.reconnect.clone();
    let supervisor = Supervisor::new(Controller::new(config), reconnect);
    let mut events = supervisor.events();
    let mut updates = supervisor.connector().updates();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    supervisor.start().await;
    let result = loop {
        tokio::select! {
            _ = &mut shutdown => break Ok(()),
            event = events.recv() => match event {
                Ok(event) => printer.event(event),
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break Ok(()),
            },
            update = updates.recv() => match update {
                Ok(update) => {
                    if let Err(e) = printer.update(&update, &supervisor.connector().model()) {
                        break Err(e);
                    }
                }
                Err(RecvError::Lagged(skipped)) => tracing::warn!(skipped, "change feed fell behind"),
                Err(RecvError::Closed) => break Ok(()),
            },
        }
    };

    supervisor.stop().await;
    result
}

async fn lost(state: &mut watch::Receiver<ConnectionState>) {
    let _ = state.wait_for(|s| *s != ConnectionState::Connected).await;
}
