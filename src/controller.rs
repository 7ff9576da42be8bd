// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::io;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, span, Instrument, Level};

use crate::{
    midi::ParsedMidiMessage,
    registry::{self, Direction, KeyEvent, PressRegistry},
    synth::{ParamsUpdate, VoiceManager},
};

pub mod keyboard;
pub mod midi;

/// How many events may queue up before drivers wait.
const EVENT_BUFFER: usize = 64;

/// Events processed by the controller, one at a time.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A raw buffer from a MIDI input port.
    Midi(Vec<u8>),

    /// A key pressed or released directly, without going through MIDI.
    Key(KeyEvent),

    /// An edit to the synthesizer parameters.
    Params(ParamsUpdate),

    /// Releases every sounding note and stops the controller.
    Shutdown,
}

pub trait Driver: Send + Sync + 'static {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>>;
}

/// The most recent input seen by the controller.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Status {
    pub last_message: Option<ParsedMidiMessage>,
    pub last_key_event: Option<KeyEvent>,
}

/// Serializes MIDI, key and parameter events onto a single queue and applies them to
/// the press registry and the voice manager.
pub struct Controller {
    handle: JoinHandle<()>,
    events_tx: Sender<Event>,
    status: Arc<Mutex<Status>>,
}

impl Controller {
    /// Creates a new controller and starts the given drivers.
    pub fn new(
        registry: PressRegistry,
        voices: Arc<Mutex<VoiceManager>>,
        channel_filter: Option<u8>,
        drivers: Vec<Arc<dyn Driver>>,
    ) -> Controller {
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let driver_handles = drivers
            .iter()
            .map(|driver| driver.monitor_events(events_tx.clone()))
            .collect();

        let status = Arc::new(Mutex::new(Status::default()));
        let event_loop = EventLoop {
            registry,
            voices,
            channel_filter,
            status: status.clone(),
        };

        let span = span!(Level::INFO, "controller");
        Controller {
            handle: tokio::spawn(event_loop.run(events_rx, driver_handles).instrument(span)),
            events_tx,
            status,
        }
    }

    /// Returns a sender for feeding events to the controller.
    pub fn sender(&self) -> Sender<Event> {
        self.events_tx.clone()
    }

    /// Returns the most recent input the controller processed.
    pub fn status(&self) -> Status {
        self.status.lock().clone()
    }

    /// Join will block until the controller finishes.
    pub async fn join(&mut self) -> Result<(), JoinError> {
        (&mut self.handle).await
    }
}

struct EventLoop {
    registry: PressRegistry,
    voices: Arc<Mutex<VoiceManager>>,
    channel_filter: Option<u8>,
    status: Arc<Mutex<Status>>,
}

impl EventLoop {
    async fn run(
        self,
        mut events_rx: Receiver<Event>,
        driver_handles: Vec<JoinHandle<Result<(), io::Error>>>,
    ) {
        info!("Controller started.");

        while let Some(event) = events_rx.recv().await {
            if matches!(event, Event::Shutdown) {
                info!("Controller shutting down.");
                break;
            }
            self.handle(event);
        }

        self.voices.lock().release_all();
        drop(events_rx);

        for handle in driver_handles {
            if handle.is_finished() {
                match handle.await {
                    Ok(Err(e)) => error!(err = e.to_string(), "Driver failed."),
                    Err(e) => error!(err = e.to_string(), "Error waiting for driver to stop."),
                    Ok(Ok(())) => {}
                }
            } else {
                // Blocked readers can't be interrupted, leave them behind.
                handle.abort();
            }
        }
        info!("Controller closed.");
    }

    fn handle(&self, event: Event) {
        match event {
            Event::Midi(raw) => {
                let Some(message) = crate::midi::parse(&raw) else {
                    debug!(raw = ?raw, "Unparsable MIDI buffer.");
                    return;
                };
                self.status.lock().last_message = Some(message);

                if let Some(key_event) = registry::classify(&message, self.channel_filter) {
                    self.key(key_event);
                }
            }
            Event::Key(key_event) => self.key(key_event),
            Event::Params(update) => self.voices.lock().set_params(&update),
            Event::Shutdown => {}
        }
    }

    fn key(&self, event: KeyEvent) {
        debug!(event = ?event, "Key event.");
        self.status.lock().last_key_event = Some(event);

        if event.direction == Direction::Down {
            self.voices.lock().activate();
        }
        // The voice manager is unlocked here so handlers can take it.
        self.registry.dispatch(event);
    }
}

#[cfg(test)]
mod test {
    use std::{error::Error, sync::Arc, time::Duration};

    use parking_lot::Mutex;

    use crate::{
        audio::mock as mock_engine,
        keybed,
        layout::{self, LayoutConfig},
        midi::{mock as mock_input, PermissionState},
        registry::{KeyEvent, PressRegistry, RetriggerBehavior},
        synth::{
            note_to_frequency, Activation, OscillatorShape, ParamsUpdate, SynthesizerParams,
            VoiceManager,
        },
        testutil::eventually_async,
    };

    use super::{midi as midi_driver, Controller, Driver, Event};

    struct Fixture {
        engine: mock_engine::Engine,
        voices: Arc<Mutex<VoiceManager>>,
        registry: PressRegistry,
    }

    fn fixture() -> Result<Fixture, Box<dyn Error>> {
        let engine = mock_engine::Engine::get("mock-engine");
        let voices = Arc::new(Mutex::new(VoiceManager::new(
            Arc::new(engine.clone()),
            SynthesizerParams::default(),
            RetriggerBehavior::Ignore,
        )));
        let registry = PressRegistry::new(RetriggerBehavior::Ignore);
        let layout = layout::generate(&LayoutConfig::default())?;
        keybed::bind(&layout, &registry, voices.clone());
        engine.clear();

        Ok(Fixture {
            engine,
            voices,
            registry,
        })
    }

    #[tokio::test]
    async fn test_midi_input() -> Result<(), Box<dyn Error>> {
        let fixture = fixture()?;
        let device = mock_input::Device::get("mock-keys");
        let driver: Arc<dyn Driver> = Arc::new(midi_driver::Driver::new(
            Arc::new(device.clone()),
            Duration::from_millis(5),
        ));
        let mut controller = Controller::new(
            fixture.registry.clone(),
            fixture.voices.clone(),
            None,
            vec![driver],
        );
        eventually_async(|| device.is_watching(), "MIDI input never attached").await;

        // Garbage and non-note messages are ignored.
        device.mock_event(&[]);
        device.mock_event(&[0xB0, 7, 100]);
        device.mock_event(&[0x90, 60, 127]);
        eventually_async(
            || fixture.voices.lock().active_notes() == vec![60],
            "C4 never sounded",
        )
        .await;
        assert_eq!(Activation::Running, fixture.voices.lock().activation());
        assert_eq!(vec![note_to_frequency(60)], fixture.engine.attacks());

        let status = controller.status();
        assert_eq!(Some(KeyEvent::down(60, 1.0)), status.last_key_event);
        assert_eq!(Some(60), status.last_message.map(|message| message.note));

        // Velocity zero note on releases.
        device.mock_event(&[0x90, 60, 0]);
        eventually_async(
            || fixture.voices.lock().active_notes().is_empty(),
            "C4 never released",
        )
        .await;
        assert_eq!(1, fixture.engine.releases().len());

        controller.sender().send(Event::Shutdown).await?;
        controller.join().await?;
        eventually_async(|| !device.is_watching(), "MIDI input never detached").await;
        Ok(())
    }

    #[tokio::test]
    async fn test_channel_filter() -> Result<(), Box<dyn Error>> {
        let fixture = fixture()?;
        let mut controller = Controller::new(
            fixture.registry.clone(),
            fixture.voices.clone(),
            Some(1),
            vec![],
        );
        let sender = controller.sender();

        sender.send(Event::Midi(vec![0x90, 64, 100])).await?;
        sender.send(Event::Midi(vec![0x91, 67, 100])).await?;
        sender.send(Event::Shutdown).await?;
        controller.join().await?;

        assert_eq!(vec![note_to_frequency(67)], fixture.engine.attacks());
        // Filtered messages are still recorded as seen.
        assert_eq!(Some(1), controller.status().last_message.map(|m| m.channel));
        Ok(())
    }

    #[tokio::test]
    async fn test_pointer_and_midi_share_keys() -> Result<(), Box<dyn Error>> {
        let fixture = fixture()?;
        let mut controller = Controller::new(
            fixture.registry.clone(),
            fixture.voices.clone(),
            None,
            vec![],
        );
        let sender = controller.sender();

        sender.send(Event::Key(KeyEvent::down(64, 0.8))).await?;
        sender.send(Event::Midi(vec![0x90, 64, 100])).await?;
        sender.send(Event::Midi(vec![0x80, 64, 0])).await?;
        sender.send(Event::Key(KeyEvent::up(64))).await?;
        sender.send(Event::Shutdown).await?;
        controller.join().await?;

        assert_eq!(1, fixture.engine.attacks().len());
        assert_eq!(1, fixture.engine.releases().len());
        assert!(fixture.registry.pressed_notes().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_params_and_shutdown() -> Result<(), Box<dyn Error>> {
        let fixture = fixture()?;
        let mut controller = Controller::new(
            fixture.registry.clone(),
            fixture.voices.clone(),
            None,
            vec![],
        );
        let sender = controller.sender();

        sender
            .send(Event::Params(ParamsUpdate {
                oscillator: Some(OscillatorShape::Square),
                ..Default::default()
            }))
            .await?;
        sender.send(Event::Key(KeyEvent::down(60, 0.5))).await?;
        sender.send(Event::Key(KeyEvent::down(64, 0.5))).await?;
        sender.send(Event::Shutdown).await?;
        controller.join().await?;

        let voices = fixture.voices.lock();
        assert_eq!(OscillatorShape::Square, voices.params().oscillator);
        assert!(voices.active_notes().is_empty());
        assert_eq!(2, fixture.engine.releases().len());
        assert_eq!(None, controller.status().last_message);
        Ok(())
    }

    #[tokio::test]
    async fn test_denied_midi_keeps_pointer_input() -> Result<(), Box<dyn Error>> {
        let fixture = fixture()?;
        let device = mock_input::Device::get("mock-denied");
        device.set_permission_state(PermissionState::Denied);
        let driver: Arc<dyn Driver> = Arc::new(midi_driver::Driver::new(
            Arc::new(device.clone()),
            Duration::from_millis(5),
        ));
        let mut controller = Controller::new(
            fixture.registry.clone(),
            fixture.voices.clone(),
            None,
            vec![driver],
        );

        controller
            .sender()
            .send(Event::Key(KeyEvent::down(72, 0.5)))
            .await?;
        eventually_async(
            || fixture.voices.lock().active_notes() == vec![72],
            "C5 never sounded",
        )
        .await;
        assert_eq!(0, device.attach_count());

        controller.sender().send(Event::Shutdown).await?;
        controller.join().await?;
        Ok(())
    }
}
