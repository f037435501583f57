//! Real-Time Thread Priority
//!
//! Platform-specific priority elevation for the thread that runs the audio
//! callback. Unlike a fire-and-forget boost, elevation hands back a
//! [`PriorityToken`] that restores the previous scheduling when the stream
//! finishes.
//!
//! # Platform Support
//!
//! - **macOS**: pthread QoS class (USER_INTERACTIVE) + time-constraint policy
//! - **Windows**: MMCSS (Multimedia Class Scheduler Service) "Pro Audio" class
//! - **Linux**: SCHED_FIFO / SCHED_RR (requires CAP_SYS_NICE or root)

/// Lazy, one-shot elevation lifecycle of one channel's stream
#[derive(Debug, Default)]
pub enum PriorityState {
    /// No stream, or the backend schedules its own thread
    #[default]
    Inactive,
    /// Stream started; the first callback will try to elevate
    Pending,
    Elevated(PriorityToken),
    /// Attempted and refused; not retried for this stream
    Failed,
}

impl PriorityState {
    /// Attempt elevation if pending; any other state is left alone.
    pub fn attempt(&mut self) {
        if !matches!(self, PriorityState::Pending) {
            return;
        }

        *self = match elevate_current_thread() {
            Some(token) => {
                log::info!("Audio thread elevated to real-time priority");
                PriorityState::Elevated(token)
            }
            None => {
                log::warn!("Failed to set real-time thread priority (non-fatal)");
                PriorityState::Failed
            }
        };
    }

    /// Revert a successful elevation; always ends `Inactive`
    pub fn release(&mut self) {
        if let PriorityState::Elevated(token) = std::mem::take(self) {
            token.revert();
            log::debug!("Audio thread priority reverted");
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, PriorityState::Pending)
    }

    pub fn label(&self) -> &'static str {
        match self {
            PriorityState::Inactive => "inactive",
            PriorityState::Pending => "pending",
            PriorityState::Elevated(_) => "elevated",
            PriorityState::Failed => "failed",
        }
    }
}

/// Proof of a successful elevation; [`revert`](PriorityToken::revert) undoes it.
#[derive(Debug)]
pub struct PriorityToken {
    inner: platform::Token,
}

impl PriorityToken {
    pub fn revert(self) {
        platform::revert(self.inner);
    }
}

/// Raise the calling thread to real-time scheduling.
///
/// Returns `None` when the OS refuses; the caller keeps running at default
/// priority.
pub fn elevate_current_thread() -> Option<PriorityToken> {
    platform::elevate().map(|inner| PriorityToken { inner })
}

// ═══════════════════════════════════════════════════════════════════════════════
// macOS Implementation
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(target_os = "macos")]
mod platform {
    use std::mem::MaybeUninit;

    const QOS_CLASS_USER_INTERACTIVE: u32 = 0x21;
    const THREAD_STANDARD_POLICY: u32 = 1;
    const THREAD_TIME_CONSTRAINT_POLICY: u32 = 2;
    const THREAD_TIME_CONSTRAINT_POLICY_COUNT: u32 = 4;

    #[repr(C)]
    struct ThreadTimeConstraintPolicy {
        period: u32,
        computation: u32,
        constraint: u32,
        preemptible: i32,
    }

    #[repr(C)]
    struct MachTimebaseInfo {
        numer: u32,
        denom: u32,
    }

    unsafe extern "C" {
        fn pthread_set_qos_class_self_np(qos_class: u32, relative_priority: i32) -> i32;
        fn mach_thread_self() -> u32;
        fn mach_timebase_info(info: *mut MachTimebaseInfo) -> i32;
        fn thread_policy_set(thread: u32, flavor: u32, policy_info: *const i32, count: u32) -> i32;
    }

    #[derive(Debug)]
    pub struct Token {
        thread: u32,
    }

    pub fn elevate() -> Option<Token> {
        let qos_result = unsafe { pthread_set_qos_class_self_np(QOS_CLASS_USER_INTERACTIVE, 0) };
        if qos_result != 0 {
            log::debug!("pthread_set_qos_class_self_np failed: {}", qos_result);
        }

        let mut timebase = MaybeUninit::<MachTimebaseInfo>::uninit();
        let timebase = unsafe {
            mach_timebase_info(timebase.as_mut_ptr());
            timebase.assume_init()
        };
        let ns_to_abs =
            |ns: u64| -> u32 { ((ns * timebase.denom as u64) / timebase.numer as u64) as u32 };

        // 1ms period, 500us computation, 1ms deadline
        let policy = ThreadTimeConstraintPolicy {
            period: ns_to_abs(1_000_000),
            computation: ns_to_abs(500_000),
            constraint: ns_to_abs(1_000_000),
            preemptible: 1,
        };

        let thread = unsafe { mach_thread_self() };
        let result = unsafe {
            thread_policy_set(
                thread,
                THREAD_TIME_CONSTRAINT_POLICY,
                (&policy as *const ThreadTimeConstraintPolicy).cast(),
                THREAD_TIME_CONSTRAINT_POLICY_COUNT,
            )
        };

        if result == 0 || qos_result == 0 {
            if result != 0 {
                log::debug!("thread_policy_set failed: {} (QoS still applied)", result);
            }
            Some(Token { thread })
        } else {
            None
        }
    }

    pub fn revert(token: Token) {
        let result = unsafe {
            thread_policy_set(token.thread, THREAD_STANDARD_POLICY, std::ptr::null(), 0)
        };
        if result != 0 {
            log::debug!("Restoring standard thread policy failed: {}", result);
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Windows Implementation
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(target_os = "windows")]
mod platform {
    use windows::Win32::Foundation::HANDLE;
    use windows::Win32::System::Threading::{
        AvRevertMmThreadCharacteristics, AvSetMmThreadCharacteristicsW, GetCurrentThread,
        SetThreadPriority, THREAD_PRIORITY_TIME_CRITICAL,
    };
    use windows::core::PCWSTR;

    #[derive(Debug)]
    pub enum Token {
        /// MMCSS task handle
        Mmcss(OsHandle),
        /// Plain thread priority; lapses with the stream thread
        ThreadPriority,
    }

    #[derive(Debug)]
    pub struct OsHandle(HANDLE);

    // SAFETY: the handle is an opaque token only passed back to the OS
    unsafe impl Send for OsHandle {}

    pub fn elevate() -> Option<Token> {
        let task_name: Vec<u16> = "Pro Audio\0".encode_utf16().collect();
        let mut task_index: u32 = 0;

        match unsafe { AvSetMmThreadCharacteristicsW(PCWSTR(task_name.as_ptr()), &mut task_index) } {
            Ok(handle) if !handle.is_invalid() => {
                log::debug!("MMCSS Pro Audio class registered (task index: {})", task_index);
                return Some(Token::Mmcss(OsHandle(handle)));
            }
            _ => log::debug!("MMCSS registration failed, falling back to thread priority"),
        }

        let current_thread: HANDLE = unsafe { GetCurrentThread() };
        if unsafe { SetThreadPriority(current_thread, THREAD_PRIORITY_TIME_CRITICAL) }.is_ok() {
            Some(Token::ThreadPriority)
        } else {
            None
        }
    }

    pub fn revert(token: Token) {
        match token {
            Token::Mmcss(OsHandle(handle)) => {
                if unsafe { AvRevertMmThreadCharacteristics(handle) }.is_err() {
                    log::debug!("AvRevertMmThreadCharacteristics failed");
                }
            }
            Token::ThreadPriority => {}
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Linux Implementation
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(target_os = "linux")]
mod platform {
    use libc::{
        SCHED_FIFO, SCHED_RR, c_int, pthread_getschedparam, pthread_self, pthread_setschedparam,
        pthread_t, sched_param,
    };

    pub struct Token {
        thread: pthread_t,
        policy: c_int,
        param: sched_param,
    }

    impl std::fmt::Debug for Token {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("Token")
                .field("policy", &self.policy)
                .field("priority", &self.param.sched_priority)
                .finish()
        }
    }

    pub fn elevate() -> Option<Token> {
        let thread = unsafe { pthread_self() };
        let mut policy: c_int = 0;
        let mut previous = sched_param { sched_priority: 0 };
        if unsafe { pthread_getschedparam(thread, &mut policy, &mut previous) } != 0 {
            log::debug!("pthread_getschedparam failed");
            return None;
        }

        // FIFO 80 leaves room for kernel threads; RR and a lower FIFO are fallbacks
        for (new_policy, priority) in [(SCHED_FIFO, 80), (SCHED_RR, 70), (SCHED_FIFO, 50)] {
            let param = sched_param {
                sched_priority: priority,
            };
            let result = unsafe { pthread_setschedparam(thread, new_policy, &param) };
            if result == 0 {
                return Some(Token {
                    thread,
                    policy,
                    param: previous,
                });
            }
            log::debug!(
                "pthread_setschedparam(policy {}, priority {}) failed: {}",
                new_policy,
                priority,
                result
            );
        }
        None
    }

    pub fn revert(token: Token) {
        let result = unsafe { pthread_setschedparam(token.thread, token.policy, &token.param) };
        if result != 0 {
            log::debug!("Restoring scheduling policy failed: {}", result);
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Unsupported Platforms
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
mod platform {
    #[derive(Debug)]
    pub struct Token;

    pub fn elevate() -> Option<Token> {
        log::debug!("Real-time priority not supported on this platform");
        None
    }

    pub fn revert(_token: Token) {}
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
