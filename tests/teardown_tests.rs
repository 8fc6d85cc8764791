mod common;

use common::{assert_clean_teardown, Failures, MockDevice, Op};
use vsync_flip::core::{CancelToken, LoopExit};
use vsync_flip::session::run_on;
use vsync_flip::Config;

fn config() -> Config {
    Config {
        timeout_secs: 1,
        ..Config::default()
    }
}

/// Run a whole session on a mock that fails as described
fn session_with(fail: Failures, overlay: bool) -> (anyhow::Result<LoopExit>, Vec<Op>) {
    let token = CancelToken::new();
    let mut device = MockDevice::new()
        .with_failures(fail)
        .cancel_after(3, token.clone());
    if overlay {
        device = device.with_overlay();
    }
    let log = device.log();
    let result = run_on(device, &config(), token, None);
    let ops = log.borrow().clone();
    (result, ops)
}

#[cfg(test)]
mod teardown_tests {
    use super::*;

    #[test]
    fn test_discovery_failure_only_closes() {
        let (result, ops) = session_with(
            Failures { find_output: true, ..Default::default() },
            false,
        );
        assert!(result.is_err());
        assert_eq!(ops, vec![Op::Close]);
    }

    #[test]
    fn test_first_allocation_failure() {
        let (result, ops) = session_with(
            Failures { allocate: Some(0), ..Default::default() },
            false,
        );
        assert!(result.is_err());
        assert_eq!(ops, vec![Op::Close]);
    }

    #[test]
    fn test_second_allocation_failure_restores_and_frees_the_first() {
        let (result, ops) = session_with(
            Failures { allocate: Some(1), ..Default::default() },
            false,
        );
        assert!(result.is_err());
        assert!(ops.contains(&Op::Restore));
        assert_clean_teardown(&ops);
    }

    #[test]
    fn test_registration_failures() {
        for nth in 0..2 {
            let (result, ops) = session_with(
                Failures { register: Some(nth), ..Default::default() },
                false,
            );
            assert!(result.is_err(), "register #{} should fail the session", nth);
            assert_clean_teardown(&ops);
        }
    }

    #[test]
    fn test_mode_set_failure_skips_restore() {
        let (result, ops) = session_with(Failures { set_mode: true, ..Default::default() }, false);
        assert!(result.is_err());
        assert!(!ops.contains(&Op::Restore));
        assert_clean_teardown(&ops);
    }

    #[test]
    fn test_initial_flip_failure() {
        let (result, ops) = session_with(Failures { flip: Some(0), ..Default::default() }, true);
        let err = result.unwrap_err();
        assert!(err.to_string().contains("initial flip"), "{}", err);
        assert_clean_teardown(&ops);
    }

    #[test]
    fn test_flip_failure_mid_session() {
        let (result, ops) = session_with(Failures { flip: Some(2), ..Default::default() }, true);
        assert!(result.is_err());
        assert_clean_teardown(&ops);
    }

    #[test]
    fn test_clean_session_with_overlay() {
        let (result, ops) = session_with(Failures::default(), true);
        assert_eq!(result.unwrap(), LoopExit::Cancelled);
        assert!(ops.contains(&Op::SetPlane { plane: 42, framebuffer: None }));
        assert!(ops
            .iter()
            .any(|op| matches!(op, Op::SetPlane { plane: 42, framebuffer: Some(_) })));
        assert_clean_teardown(&ops);
    }

    #[test]
    fn test_overlay_allocation_failure_is_not_fatal() {
        let (result, ops) = session_with(
            Failures { allocate: Some(2), ..Default::default() },
            true,
        );
        assert_eq!(result.unwrap(), LoopExit::Cancelled);
        assert!(!ops.iter().any(|op| matches!(op, Op::SetPlane { .. })));
        assert_clean_teardown(&ops);
    }

    #[test]
    fn test_overlay_plane_failure_releases_its_buffer() {
        let (result, ops) = session_with(Failures { set_plane: true, ..Default::default() }, true);
        assert_eq!(result.unwrap(), LoopExit::Cancelled);
        assert_eq!(ops.iter().filter(|op| matches!(op, Op::Allocate(_))).count(), 3);
        assert_clean_teardown(&ops);
    }

    #[test]
    fn test_no_overlay_plane_allocates_nothing_extra() {
        let (result, ops) = session_with(Failures::default(), false);
        assert_eq!(result.unwrap(), LoopExit::Cancelled);
        assert_eq!(ops.iter().filter(|op| matches!(op, Op::Allocate(_))).count(), 2);
        assert_clean_teardown(&ops);
    }

    #[test]
    fn test_overlay_disabled_by_config() {
        let token = CancelToken::new();
        let device = MockDevice::new().with_overlay().cancel_after(2, token.clone());
        let log = device.log();
        let config = Config {
            overlay: false,
            ..config()
        };

        run_on(device, &config, token, None).unwrap();
        assert!(!log.borrow().iter().any(|op| matches!(op, Op::SetPlane { .. })));
    }
}
