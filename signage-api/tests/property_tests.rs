//! Property-based tests for screen classification and pairing codes

use std::time::Duration;

use chrono::Utc;
use proptest::prelude::*;

use signage_api::{
    generate_pairing_code, DeviceId, MediaItem, PlaylistId, Screen, ScreenPhase, ScreenStatus,
    PAIRING_CODE_ALPHABET, PAIRING_CODE_LEN,
};

// ============================================================================
// Strategies
// ============================================================================

fn status_strategy() -> impl Strategy<Value = ScreenStatus> {
    prop_oneof![
        Just(ScreenStatus::Pending),
        Just(ScreenStatus::Online),
        Just(ScreenStatus::Unknown),
    ]
}

fn code_strategy() -> impl Strategy<Value = Option<String>> {
    proptest::option::of("[A-HJ-NP-Z2-9]{6}")
}

fn screen_strategy() -> impl Strategy<Value = Screen> {
    (
        status_strategy(),
        code_strategy(),
        proptest::option::of("op[0-9]{1,3}"),
        proptest::option::of("PL[0-9]{1,4}"),
    )
        .prop_map(|(status, pairing_code, assigned_to, playlist_id)| Screen {
            id: DeviceId::new("D1"),
            name: None,
            status,
            pairing_code,
            assigned_to,
            playlist_id: playlist_id.map(PlaylistId::new),
            last_ping: None,
        })
}

// ============================================================================
// Classification
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Active exactly when online, or assigned with the code consumed.
    #[test]
    fn prop_phase_matches_activity_rule(screen in screen_strategy()) {
        let expected = screen.status == ScreenStatus::Online
            || (screen.assigned_to.is_some() && screen.pairing_code.is_none());
        prop_assert_eq!(screen.phase().is_active(), expected);
    }

    /// The phase carries the playlist when active and the code when pairing.
    #[test]
    fn prop_phase_carries_payload(screen in screen_strategy()) {
        match screen.phase() {
            ScreenPhase::Active { playlist_id } => prop_assert_eq!(playlist_id, screen.playlist_id.clone()),
            ScreenPhase::Pairing { code } => prop_assert_eq!(code, screen.pairing_code.clone()),
        }
    }

    /// Heartbeat writes never change the phase.
    #[test]
    fn prop_last_ping_does_not_affect_phase(screen in screen_strategy(), secs in 0i64..1_000_000) {
        let mut pinged = screen.clone();
        pinged.last_ping = Some(Utc::now() + chrono::Duration::seconds(secs));
        prop_assert_eq!(screen.phase(), pinged.phase());
    }

    /// A freshly created pending row is always pairing and named after its code.
    #[test]
    fn prop_pending_row_is_pairing(code in "[A-HJ-NP-Z2-9]{6}") {
        let screen = Screen::pending(DeviceId::new("D1"), code.clone(), Utc::now());
        let expected_name = format!("TV-{}", code);
        prop_assert_eq!(screen.name.as_deref(), Some(expected_name.as_str()));
        prop_assert_eq!(screen.phase(), ScreenPhase::Pairing { code: Some(code) });
    }
}

// ============================================================================
// Pairing codes
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn prop_pairing_code_uses_unambiguous_alphabet(_seed in any::<u64>()) {
        let code = generate_pairing_code();
        prop_assert_eq!(code.len(), PAIRING_CODE_LEN);
        prop_assert!(code.bytes().all(|b| PAIRING_CODE_ALPHABET.contains(&b)));
        prop_assert!(!code.contains('0') && !code.contains('O'));
        prop_assert!(!code.contains('1') && !code.contains('I'));
    }
}

// ============================================================================
// Image durations
// ============================================================================

proptest! {
    /// Any stored duration yields a usable display time.
    #[test]
    fn prop_display_duration_is_always_positive(secs in any::<f64>()) {
        let item = MediaItem {
            duration: Some(secs),
            ..MediaItem::image("https://cdn.example.com/a.jpg", 1)
        };
        let shown = item.display_duration(Duration::from_secs(10));
        prop_assert!(shown > Duration::ZERO);
        if !(secs.is_finite() && secs > 0.0) {
            prop_assert_eq!(shown, Duration::from_secs(10));
        }
    }
}
