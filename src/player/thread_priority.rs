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
use thread_priority::{set_current_thread_priority, ThreadPriority, ThreadPriorityValue};
use tracing::{info, warn};

const PRIORITY_VAR: &str = "DSEPLAY_THREAD_PRIORITY";
const DISABLE_RT_VAR: &str = "DSEPLAY_DISABLE_RT_AUDIO";

/// Used when DSEPLAY_THREAD_PRIORITY is unset or out of range.
const DEFAULT_TICK_THREAD_PRIORITY: u8 = 70;

/// Priority for the sequencer thread, from DSEPLAY_THREAD_PRIORITY (0-99).
pub fn tick_thread_priority() -> u8 {
    std::env::var(PRIORITY_VAR)
        .ok()
        .and_then(|v| v.parse::<u8>().ok())
        .filter(|n| *n < 100)
        .unwrap_or(DEFAULT_TICK_THREAD_PRIORITY)
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| {
            v == "1"
                || v.eq_ignore_ascii_case("true")
                || v.eq_ignore_ascii_case("yes")
                || v.eq_ignore_ascii_case("on")
        })
        .unwrap_or(false)
}

/// Whether to try SCHED_FIFO for the sequencer thread. On unless DSEPLAY_DISABLE_RT_AUDIO is set.
pub fn rt_enabled() -> bool {
    !env_flag(DISABLE_RT_VAR)
}

/// Raises the priority of the calling thread. Failures are logged and otherwise ignored.
pub fn configure_tick_thread_priority(priority: u8, rt: bool) {
    let Ok(value) = ThreadPriorityValue::try_from(priority) else {
        warn!(priority, "Invalid thread priority");
        return;
    };
    let tp = ThreadPriority::Crossplatform(value);
    if let Err(e) = set_current_thread_priority(tp) {
        warn!(error = ?e, "Failed to raise sequencer thread priority");
    }

    #[cfg(unix)]
    if rt {
        use thread_priority::unix::{
            set_thread_priority_and_policy, thread_native_id, RealtimeThreadSchedulePolicy,
            ThreadSchedulePolicy,
        };
        match set_thread_priority_and_policy(
            thread_native_id(),
            tp,
            ThreadSchedulePolicy::Realtime(RealtimeThreadSchedulePolicy::Fifo),
        ) {
            Ok(()) => info!("Enabled RT SCHED_FIFO for sequencer thread"),
            Err(e) => warn!(error = %e, "Failed to set RT SCHED_FIFO for sequencer thread"),
        }
    }
    #[cfg(not(unix))]
    let _ = rt;
}

#[cfg(test)]
mod test {
    use serial_test::serial;

    use super::*;

    #[test]
    #[serial]
    fn test_priority_from_env() {
        std::env::remove_var(PRIORITY_VAR);
        assert_eq!(70, tick_thread_priority());

        std::env::set_var(PRIORITY_VAR, "42");
        assert_eq!(42, tick_thread_priority());

        std::env::set_var(PRIORITY_VAR, "100");
        assert_eq!(70, tick_thread_priority());

        std::env::set_var(PRIORITY_VAR, "high");
        assert_eq!(70, tick_thread_priority());

        std::env::remove_var(PRIORITY_VAR);
    }

    #[test]
    #[serial]
    fn test_rt_flag() {
        std::env::remove_var(DISABLE_RT_VAR);
        assert!(rt_enabled());

        for value in ["1", "true", "YES", "On"] {
            std::env::set_var(DISABLE_RT_VAR, value);
            assert!(!rt_enabled(), "{value} should disable RT");
        }

        std::env::set_var(DISABLE_RT_VAR, "0");
        assert!(rt_enabled());
        std::env::remove_var(DISABLE_RT_VAR);
    }
}
