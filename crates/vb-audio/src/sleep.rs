//! High-Resolution Sleep
//!
//! Blocks on a one-shot OS timer and reports the elapsed time as measured by
//! a monotonic clock. The result is what actually passed, which is never
//! more precise than the OS scheduler allows.
//!
//! - **Windows**: high-resolution waitable timer
//! - **Linux**: `clock_nanosleep(CLOCK_MONOTONIC)`
//! - **Elsewhere**: `std::thread::sleep`

use std::time::{Duration, Instant};

/// Sleep for `duration`; returns the measured elapsed time.
pub fn precise_sleep(duration: Duration) -> Duration {
    let start = Instant::now();
    if !duration.is_zero() {
        platform::sleep(duration);
    }
    start.elapsed()
}

pub fn sleep_ms(ms: u64) -> Duration {
    precise_sleep(Duration::from_millis(ms))
}

pub fn sleep_ns(ns: u64) -> Duration {
    precise_sleep(Duration::from_nanos(ns))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Windows Implementation
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(target_os = "windows")]
mod platform {
    use std::time::Duration;

    use windows::Win32::Foundation::CloseHandle;
    use windows::Win32::System::Threading::{
        CREATE_WAITABLE_TIMER_HIGH_RESOLUTION, CreateWaitableTimerExW, INFINITE, SetWaitableTimer,
        TIMER_ALL_ACCESS, WaitForSingleObject,
    };
    use windows::core::PCWSTR;

    pub fn sleep(duration: Duration) {
        let timer = match unsafe {
            CreateWaitableTimerExW(
                None,
                PCWSTR::null(),
                CREATE_WAITABLE_TIMER_HIGH_RESOLUTION,
                TIMER_ALL_ACCESS.0,
            )
        } {
            Ok(timer) => timer,
            Err(e) => {
                log::debug!("High-resolution timer unavailable ({}), using thread sleep", e);
                std::thread::sleep(duration);
                return;
            }
        };

        // negative due time is relative, in 100 ns units
        let due = -((duration.as_nanos() / 100).max(1) as i64);
        let armed = unsafe { SetWaitableTimer(timer, &due, 0, None, None, false) };
        if armed.is_ok() {
            unsafe { WaitForSingleObject(timer, INFINITE) };
        } else {
            std::thread::sleep(duration);
        }

        let _ = unsafe { CloseHandle(timer) };
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Linux Implementation
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(target_os = "linux")]
mod platform {
    use std::time::Duration;

    use libc::{CLOCK_MONOTONIC, EINTR, clock_nanosleep, timespec};

    pub fn sleep(duration: Duration) {
        let mut request = timespec {
            tv_sec: duration.as_secs() as libc::time_t,
            tv_nsec: duration.subsec_nanos() as libc::c_long,
        };
        let mut remaining = timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };

        loop {
            let result = unsafe { clock_nanosleep(CLOCK_MONOTONIC, 0, &request, &mut remaining) };
            match result {
                0 => return,
                EINTR => request = remaining,
                _ => {
                    log::debug!("clock_nanosleep failed: {}", result);
                    std::thread::sleep(duration);
                    return;
                }
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Other Platforms
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(not(any(target_os = "windows", target_os = "linux")))]
mod platform {
    use std::time::Duration;

    pub fn sleep(duration: Duration) {
        std::thread::sleep(duration);
    }
}
