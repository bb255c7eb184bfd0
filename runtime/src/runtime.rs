// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (c) 2024 Takashi Sakamoto

//! The runtime of the service; dispatchers for sound card and UNIX signal events, the
//! reader thread of the notification endpoint, the event loop, and the delayed commit
//! of edits to NVRAM.

use {
    super::*,
    std::{
        sync::{
            atomic::{AtomicBool, Ordering},
            mpsc, Arc,
        },
        thread,
        time::Duration,
    },
};

enum Event {
    Shutdown,
    Disconnected,
    Elem((ElemId, ElemEventMask)),
    Interrupt(u32),
    SaveTimer(u32),
}

const SYSTEM_DISPATCHER_NAME: &str = "system event dispatcher";
const SAVE_DISPATCHER_NAME: &str = "config save dispatcher";

/// Delay between the last configuration edit and the request to persist it.
const SAVE_DELAY: Duration = Duration::from_secs(2);

const NOTIFICATION_TIMEOUT_MS: u32 = 500;
const NOTIFICATION_MSG_SIZE: usize = 8;

pub struct ScarlettRuntime {
    unit: ScarlettTransaction<ScarlettUsbDevice>,
    device: ScarlettUsbDevice,
    model: ScarlettModel,
    card_cntr: CardCntr,
    rx: mpsc::Receiver<Event>,
    tx: mpsc::SyncSender<Event>,
    dispatchers: Vec<Dispatcher>,
    save_timer: Option<Dispatcher>,
    save_generation: u32,
    notify_running: Arc<AtomicBool>,
    notify_th: Option<thread::JoinHandle<()>>,
}

impl Drop for ScarlettRuntime {
    fn drop(&mut self) {
        self.notify_running.store(false, Ordering::Relaxed);
        if let Some(th) = self.notify_th.take() {
            let _ = th.join();
        }

        self.save_timer = None;

        // At first, stop event loop in all of dispatchers to avoid queueing new events.
        for dispatcher in &mut self.dispatchers {
            dispatcher.stop();
        }

        // Next, consume all events in queue to release blocked thread for sender.
        for _ in self.rx.try_iter() {}

        // Finally Finish I/O threads.
        self.dispatchers.clear();
    }
}

impl ScarlettRuntime {
    pub fn new(card_id: u32, device_path: &str) -> Result<Self, Error> {
        let device = ScarlettUsbDevice::open(device_path)?;

        let info = detect_model(device.usb_id()).ok_or_else(|| {
            let msg = format!(
                "{:04x}:{:04x} is not a supported model",
                device.usb_id().0,
                device.usb_id().1
            );
            Error::new(FileError::Inval, &msg)
        })?;

        info!("{} found at {}", info.name, device_path);

        let card_cntr = CardCntr::default();
        card_cntr.card.open(card_id, 0)?;

        let unit = ScarlettTransaction::new(device.clone());
        let model = ScarlettModel::new(info);

        // Use uni-directional channel for communication to child threads.
        let (tx, rx) = mpsc::sync_channel(32);

        Ok(Self {
            unit,
            device,
            model,
            card_cntr,
            rx,
            tx,
            dispatchers: Default::default(),
            save_timer: None,
            save_generation: 0,
            notify_running: Arc::new(AtomicBool::new(true)),
            notify_th: None,
        })
    }

    pub fn listen(&mut self) -> Result<(), Error> {
        self.launch_system_event_dispatcher()?;

        // The session is initialized by the handshake, then goes operational after the
        // full state read and the canonical mux emission.
        self.unit.init(TIMEOUT_MS)?;

        let enter = debug_span!("cache").entered();
        self.model.cache(&mut self.unit)?;
        enter.exit();

        let enter = debug_span!("load").entered();
        self.model.load(&mut self.card_cntr)?;
        enter.exit();

        self.launch_notification_reader();

        Ok(())
    }

    pub fn run(&mut self) -> Result<(), Error> {
        let enter = debug_span!("event").entered();
        loop {
            let ev = match self.rx.recv() {
                Ok(ev) => ev,
                Err(_) => break,
            };

            match ev {
                Event::Shutdown | Event::Disconnected => break,
                Event::Elem((elem_id, events)) => {
                    let _enter = debug_span!("element").entered();
                    debug!(
                        name = elem_id.name().as_str(),
                        iface = ?elem_id.iface(),
                        index = elem_id.index(),
                    );

                    let _ = self.card_cntr.dispatch_elem_event(
                        &mut self.unit,
                        &elem_id,
                        &events,
                        &mut self.model,
                    );

                    self.apply_side_effects();
                }
                Event::Interrupt(msg) => {
                    let _enter = debug_span!("notified").entered();
                    debug!(notification = msg);

                    let elem_id_list = self.model.parse_notification(msg);
                    let _ = self.card_cntr.refresh_elems(
                        &mut self.unit,
                        &elem_id_list,
                        &mut self.model,
                    );
                }
                Event::SaveTimer(generation) => {
                    // Shots armed before the latest edit are stale and dropped.
                    if generation == self.save_generation && self.save_timer.take().is_some() {
                        let res = self.unit.save_config(TIMEOUT_MS);
                        debug!(save = ?res);
                    }
                }
            }
        }
        enter.exit();

        // A pending save is flushed rather than lost.
        if self.save_timer.take().is_some() {
            self.unit.save_config(TIMEOUT_MS)?;
        }

        Ok(())
    }

    fn apply_side_effects(&mut self) {
        self.model
            .take_access_changes()
            .iter()
            .for_each(|(elem_id, writable)| {
                self.card_cntr.set_elem_writable(elem_id, *writable);
            });

        let changed = self.model.take_changed_elems();
        if !changed.is_empty() {
            let _ = self
                .card_cntr
                .refresh_elems(&mut self.unit, &changed, &mut self.model);
        }

        if self.model.take_config_touched() {
            self.arm_save_timer();
        }
    }

    fn arm_save_timer(&mut self) {
        // Replacing the dispatcher cancels a pending shot; one which already fired is
        // dropped by the generation check.
        self.save_generation = self.save_generation.wrapping_add(1);
        self.save_timer = None;

        match Dispatcher::run(SAVE_DISPATCHER_NAME.to_string()) {
            Ok(mut dispatcher) => {
                let tx = self.tx.clone();
                let generation = self.save_generation;
                dispatcher.attach_oneshot_handler(SAVE_DELAY, move || {
                    let _ = tx.send(Event::SaveTimer(generation));
                });
                self.save_timer = Some(dispatcher);
            }
            Err(e) => warn!("save timer unavailable: {}", e),
        }
    }

    fn launch_system_event_dispatcher(&mut self) -> Result<(), Error> {
        let name = SYSTEM_DISPATCHER_NAME.to_string();
        let mut dispatcher = Dispatcher::run(name)?;

        let tx = self.tx.clone();
        dispatcher.attach_signal_handler(signal::Signal::SIGINT, move || {
            let _ = tx.send(Event::Shutdown);
            ControlFlow::Break
        });

        let tx = self.tx.clone();
        dispatcher.attach_snd_card(&self.card_cntr.card, |_| {})?;
        self.card_cntr
            .card
            .connect_handle_elem_event(move |_, elem_id, events| {
                let elem_id: ElemId = elem_id.clone();
                let _ = tx.send(Event::Elem((elem_id, events)));
            });

        self.dispatchers.push(dispatcher);

        Ok(())
    }

    /// The reader posts decoded notification messages to the event loop and issues no
    /// USB request of its own.
    fn launch_notification_reader(&mut self) {
        let mut device = self.device.clone();
        let running = self.notify_running.clone();
        let tx = self.tx.clone();
        let packet_size = device.notification_packet_size().max(NOTIFICATION_MSG_SIZE);

        let th = thread::spawn(move || {
            let mut frame = vec![0u8; packet_size];
            while running.load(Ordering::Relaxed) {
                match device.read_notification(&mut frame, NOTIFICATION_TIMEOUT_MS) {
                    Ok(len) if len == NOTIFICATION_MSG_SIZE => {
                        let msg = u32::from_le_bytes([frame[0], frame[1], frame[2], frame[3]]);
                        let _ = tx.send(Event::Interrupt(msg));
                    }
                    Ok(_) => (),
                    Err(_) => {
                        let _ = tx.send(Event::Disconnected);
                        break;
                    }
                }
            }
        });

        self.notify_th = Some(th);
    }
}
