#![allow(non_camel_case_types)]

//! Raw kernel interface for Syscall User Dispatch on x86_64 Linux.

#[cfg(not(all(target_os = "linux", target_arch = "x86_64")))]
compile_error!("sud-sys only supports x86_64 Linux");

use std::arch::global_asm;

use libc::{c_int, c_long, c_uint, c_ulong, c_void};

// From #include <linux/prctl.h>
pub const PR_SET_SYSCALL_USER_DISPATCH: c_int = 59;
pub const PR_SYS_DISPATCH_OFF: c_ulong = 0;
pub const PR_SYS_DISPATCH_ON: c_ulong = 1;

// Values of the selector byte.
pub const SYSCALL_DISPATCH_FILTER_ALLOW: u8 = 0;
pub const SYSCALL_DISPATCH_FILTER_BLOCK: u8 = 1;

// si_code of a SIGSYS raised by syscall user dispatch.
pub const SYS_USER_DISPATCH: c_int = 2;

// From arch/x86/include/uapi/asm/signal.h; not part of the glibc API.
pub const SA_RESTORER: c_ulong = 0x0400_0000;

// Size of the kernel's sigset_t, as passed to rt_sigaction.
pub const KERNEL_SIGSET_SIZE: usize = 8;

/// `siginfo_t` as filled in for SIGSYS (the `_sigsys` arm of the union).
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct siginfo_sigsys {
    pub si_signo: c_int,
    pub si_errno: c_int,
    pub si_code: c_int,
    _pad: c_int,
    pub si_call_addr: *mut c_void,
    pub si_syscall: c_int,
    pub si_arch: c_uint,
}

/// The structure the `rt_sigaction` system call takes, which differs from
/// the C library's `struct sigaction`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct kernel_sigaction {
    pub sa_handler: usize,
    pub sa_flags: c_ulong,
    pub sa_restorer: usize,
    pub sa_mask: u64,
}

// The dispatcher region. Every syscall instruction the interception engine
// executes on its hot path lives between the two labels, and the kernel never
// traps a syscall whose return address falls inside it. The `nop` keeps the
// return address of the last syscall inside the range.
//
// sud_enter_syscall(nr, a1, a2, a3, a4, a5, a6) follows the SysV calling
// convention, so the seventh argument arrives on the stack.
//
// sud_restore_rt is installed as the SA_RESTORER of the SIGSYS handler: the
// handler returns into it and it issues rt_sigreturn from inside the region.
global_asm!(
    ".pushsection .text.sud_dispatch,\"ax\",@progbits",
    ".p2align 4",
    ".globl sud_dispatcher_start",
    ".hidden sud_dispatcher_start",
    "sud_dispatcher_start:",
    ".globl sud_enter_syscall",
    ".hidden sud_enter_syscall",
    ".type sud_enter_syscall,@function",
    "sud_enter_syscall:",
    "    mov rax, rdi",
    "    mov rdi, rsi",
    "    mov rsi, rdx",
    "    mov rdx, rcx",
    "    mov r10, r8",
    "    mov r8, r9",
    "    mov r9, qword ptr [rsp + 8]",
    "    syscall",
    "    ret",
    ".size sud_enter_syscall, . - sud_enter_syscall",
    ".globl sud_restore_rt",
    ".hidden sud_restore_rt",
    ".type sud_restore_rt,@function",
    "sud_restore_rt:",
    "    mov eax, 15",
    "    syscall",
    "    nop",
    ".size sud_restore_rt, . - sud_restore_rt",
    ".globl sud_dispatcher_end",
    ".hidden sud_dispatcher_end",
    "sud_dispatcher_end:",
    ".popsection",
);

extern "C" {
    pub fn sud_enter_syscall(
        nr: c_long,
        a1: c_long,
        a2: c_long,
        a3: c_long,
        a4: c_long,
        a5: c_long,
        a6: c_long,
    ) -> c_long;

    pub fn sud_restore_rt();

    pub static sud_dispatcher_start: u8;
    pub static sud_dispatcher_end: u8;
}
