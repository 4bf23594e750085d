//! FSM unit tests

use gemix::operation::fsm::{ClusterEvent, ClusterFsm, ClusterState};

#[test]
fn test_fsm_initial_state() {
    let fsm = ClusterFsm::new();
    assert_eq!(fsm.state(), ClusterState::Pending);
    assert!(fsm.error().is_none());
    assert!(fsm.failed_in().is_none());
}

#[test]
fn test_fsm_upgrade_success_flow() {
    let mut fsm = ClusterFsm::new();

    // Pending -> Stopping -> Stopped
    fsm.process(ClusterEvent::Stop).unwrap();
    assert_eq!(fsm.state(), ClusterState::Stopping);
    fsm.process(ClusterEvent::Stopped).unwrap();

    // Stopped -> Uninstalling -> Uninstalled
    fsm.process(ClusterEvent::Uninstall).unwrap();
    fsm.process(ClusterEvent::Uninstalled).unwrap();
    assert_eq!(fsm.state(), ClusterState::Uninstalled);

    // Uninstalled -> Installing -> Installed
    fsm.process(ClusterEvent::Install).unwrap();
    fsm.process(ClusterEvent::Installed).unwrap();

    // Installed -> Starting -> Running
    fsm.process(ClusterEvent::Start).unwrap();
    fsm.process(ClusterEvent::Started).unwrap();
    assert_eq!(fsm.state(), ClusterState::Running);
}

#[test]
fn test_fsm_failure_flow() {
    let mut fsm = ClusterFsm::new();

    fsm.process(ClusterEvent::Install).unwrap();
    fsm.process(ClusterEvent::Fail("test error".to_string())).unwrap();

    assert_eq!(fsm.state(), ClusterState::Failed);
    assert_eq!(fsm.error(), Some("test error"));
    assert_eq!(fsm.failed_in(), Some(ClusterState::Installing));
}

#[test]
fn test_fsm_failed_is_terminal() {
    let mut fsm = ClusterFsm::new();
    fsm.process(ClusterEvent::Start).unwrap();
    fsm.process(ClusterEvent::Fail("meta not ready".to_string())).unwrap();

    assert!(fsm.process(ClusterEvent::Start).is_err());
    assert!(fsm.process(ClusterEvent::Fail("again".to_string())).is_err());
    assert_eq!(fsm.error(), Some("meta not ready"));
}

#[test]
fn test_fsm_restart_after_stop() {
    let mut fsm = ClusterFsm::new();
    fsm.process(ClusterEvent::Stop).unwrap();
    fsm.process(ClusterEvent::Stopped).unwrap();

    // Stopped -> Starting
    fsm.process(ClusterEvent::Start).unwrap();
    assert_eq!(fsm.state(), ClusterState::Starting);
}

#[test]
fn test_fsm_invalid_transition() {
    let mut fsm = ClusterFsm::new();

    // Cannot finish a stage that never began
    assert!(fsm.process(ClusterEvent::Installed).is_err());

    // Install cannot follow Stopped without Uninstall
    fsm.process(ClusterEvent::Stop).unwrap();
    fsm.process(ClusterEvent::Stopped).unwrap();
    assert!(fsm.process(ClusterEvent::Install).is_err());
    assert_eq!(fsm.state(), ClusterState::Stopped);
}
