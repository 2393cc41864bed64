use log::info;

use crate::communication::StatusStream;
use crate::error::Result;
use crate::robot::config::ServiceConfig;
use crate::station::{CleaningService, CurrentState};

/// Front-end state: the service plus whatever it last told us.
pub struct App {
    service: CleaningService,
    stream: StatusStream,
    pub state: CurrentState,
    pub last_message: String,
    quit: bool,
}

impl App {
    /// Wraps a fresh service; nothing runs until [`App::toggle`] or
    /// [`App::start`].
    pub fn new(config: ServiceConfig) -> Result<Self> {
        let service = CleaningService::new(config);
        let stream = service.status_stream();
        let state = service.current_state()?;
        Ok(Self {
            service,
            stream,
            state,
            last_message: "Press 's' to start, 'q' to quit".to_string(),
            quit: false,
        })
    }

    pub fn start(&mut self) -> Result<()> {
        // Stop closes every subscription, so each start gets a new one.
        self.stream = self.service.status_stream();
        if self.service.start()? {
            info!("App: Cleaning started");
        }
        Ok(())
    }

    pub fn toggle(&mut self) -> Result<()> {
        if self.service.is_running()? {
            self.service.stop()?;
            self.last_message = "Stopped".to_string();
            self.refresh()
        } else {
            self.start()
        }
    }

    /// Folds pending snapshots into the displayed state.
    pub fn update(&mut self) -> Result<()> {
        if let Some(snapshot) = self.stream.drain().pop() {
            self.last_message = snapshot.message;
        }
        self.refresh()
    }

    pub fn battery_capacity(&self) -> u32 {
        self.service.config().run.battery_capacity
    }

    pub fn request_quit(&mut self) {
        self.quit = true;
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }

    pub fn shutdown(&mut self) -> Result<()> {
        self.service.stop()
    }

    fn refresh(&mut self) -> Result<()> {
        self.state = self.service.current_state()?;
        Ok(())
    }
}
