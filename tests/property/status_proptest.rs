//! Property tests for the status broadcaster

use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use balloonpop_sync::client::sync::network_monitor::{HostLink, NetworkProbe};
use balloonpop_sync::client::{ConnectionStatus, StatusBroadcaster, StatusEvent};
use balloonpop_sync::shared::config::SyncConfig;

use crate::common::{CountingOverlay, SwitchTransport};

fn broadcaster(initially_online: bool, overlay: Arc<CountingOverlay>) -> StatusBroadcaster {
    let probe = NetworkProbe::new(
        &SyncConfig::default(),
        true,
        Arc::new(SwitchTransport::new(true)),
        Arc::new(HostLink::new(initially_online)),
    );
    StatusBroadcaster::new(Arc::new(probe), overlay)
}

proptest! {
    #[test]
    fn prop_notifies_once_per_flip(initial in any::<bool>(), signals in prop::collection::vec(any::<bool>(), 0..64)) {
        let overlay = Arc::new(CountingOverlay::default());
        let status = broadcaster(initial, overlay.clone());
        let went_online = Arc::new(AtomicUsize::new(0));
        let went_offline = Arc::new(AtomicUsize::new(0));
        {
            let went_online = went_online.clone();
            let went_offline = went_offline.clone();
            status.subscribe(move |event, _| {
                match event {
                    StatusEvent::WentOnline => went_online.fetch_add(1, Ordering::SeqCst),
                    StatusEvent::WentOffline => went_offline.fetch_add(1, Ordering::SeqCst),
                };
                Ok(())
            });
        }

        let mut expected_online = 0;
        let mut expected_offline = 0;
        let mut current = initial;
        for &online in &signals {
            if online {
                status.set_online();
            } else {
                status.set_offline();
            }
            if online != current {
                if online {
                    expected_online += 1;
                } else {
                    expected_offline += 1;
                }
                current = online;
            }
        }

        prop_assert_eq!(went_online.load(Ordering::SeqCst), expected_online);
        prop_assert_eq!(went_offline.load(Ordering::SeqCst), expected_offline);
        prop_assert_eq!(status.status(), ConnectionStatus::from(current));
        prop_assert_eq!(overlay.hidden.load(Ordering::SeqCst), expected_online);
    }

    #[test]
    fn prop_failing_subscriber_does_not_starve_others(signals in prop::collection::vec(any::<bool>(), 1..32)) {
        let status = broadcaster(true, Arc::new(CountingOverlay::default()));
        let delivered = Arc::new(AtomicUsize::new(0));
        status.subscribe(|_, _| Err("boom".to_string()));
        status.subscribe(|_, _| panic!("subscriber panicked"));
        {
            let delivered = delivered.clone();
            status.subscribe(move |_, _| {
                delivered.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }

        let mut flips = 0;
        let mut current = true;
        for &online in &signals {
            if online {
                status.set_online();
            } else {
                status.set_offline();
            }
            if online != current {
                flips += 1;
                current = online;
            }
        }

        prop_assert_eq!(delivered.load(Ordering::SeqCst), flips);
    }
}
