//! Many threads driving one control plane

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use audio_devctl::{
    AudioDevCtl, Capability, ClientType, DeviceInfo, EventKind, EventMask, EventPayload,
    MockDevice, SessionKind, SessionMask,
};

const DEVICES: u32 = 4;
const ROUNDS: u32 = 200;

fn setup() -> Arc<AudioDevCtl> {
    let ctl = Arc::new(AudioDevCtl::new());
    for id in 0..DEVICES {
        ctl.register(
            DeviceInfo::new(format!("codec{}", id), Capability::RX | Capability::TX),
            Box::new(MockDevice::new()),
        )
        .unwrap();
        ctl.open(id).unwrap();
    }
    ctl
}

fn assert_mirror(ctl: &AudioDevCtl) {
    for kind in [SessionKind::Decoder, SessionKind::Encoder] {
        let sessions = match kind {
            SessionKind::Decoder => ctl.config().max_decoder_sessions,
            SessionKind::Encoder => ctl.config().max_encoder_sessions,
        };
        for session in 0..sessions {
            let mask = ctl.route_mask(session, kind).unwrap();
            let bit = SessionMask::session(kind.client_type(), session).unwrap();
            for device in 0..DEVICES {
                let routed = mask & (1 << device) != 0;
                let in_lane = ctl.device_status(device).unwrap().sessions.contains(bit);
                assert_eq!(
                    routed, in_lane,
                    "{:?} session {} device {} diverged",
                    kind, session, device
                );
            }
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_routing_keeps_mirror() {
    let ctl = setup();
    let delivered = Arc::new(AtomicUsize::new(0));

    // Listeners call back into the control plane from inside the callback
    for session in 0..6 {
        let inner = Arc::clone(&ctl);
        let count = Arc::clone(&delivered);
        ctl.subscribe(
            EventMask::all(),
            ClientType::Decoder,
            session,
            Arc::new(move |_: EventKind, _: &EventPayload| {
                let _ = inner.route_mask(session, SessionKind::Decoder);
                count.fetch_add(1, Ordering::Relaxed);
            }),
        )
        .unwrap();
    }

    let mut tasks = Vec::new();
    for worker in 0..8u32 {
        let ctl = Arc::clone(&ctl);
        tasks.push(tokio::task::spawn_blocking(move || {
            for round in 0..ROUNDS {
                let device = (worker + round) % DEVICES;
                let (kind, session) = if worker % 2 == 0 {
                    (SessionKind::Decoder, (worker / 2 + round) % 6)
                } else {
                    (SessionKind::Encoder, round % 2)
                };
                let enable = round % 3 != 0;

                ctl.set_session_route(session, device, enable, kind).unwrap();
                let rate = [8000, 16000, 48000][(round % 3) as usize];
                let capability = match kind {
                    SessionKind::Decoder => Capability::RX,
                    SessionKind::Encoder => Capability::TX,
                };
                let _ = ctl.request_frequency(session, kind.client_type(), capability, rate);
                if round % 5 == 0 {
                    ctl.post_event(EventKind::DeviceReady, device);
                }
            }
        }));
    }

    for task in tasks {
        task.await.unwrap();
    }

    assert_mirror(&ctl);
    assert!(delivered.load(Ordering::Relaxed) > 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_subscribe_unsubscribe() {
    let ctl = setup();

    let mut tasks = Vec::new();
    for session in 0..6u32 {
        let ctl = Arc::clone(&ctl);
        tasks.push(tokio::task::spawn_blocking(move || {
            for round in 0..ROUNDS {
                ctl.subscribe(
                    EventMask::all(),
                    ClientType::Decoder,
                    session,
                    Arc::new(|_: EventKind, _: &EventPayload| {}),
                )
                .unwrap();
                ctl.set_session_route(session, round % DEVICES, true, SessionKind::Decoder)
                    .unwrap();
                ctl.post_event(EventKind::DeviceReady, round % DEVICES);
                ctl.unsubscribe(ClientType::Decoder, session).unwrap();
            }
        }));
    }

    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(ctl.listener_count(), 0);
    assert_mirror(&ctl);
    for device in 0..DEVICES {
        assert!(ctl.device_status(device).unwrap().sessions.is_empty());
    }
}
