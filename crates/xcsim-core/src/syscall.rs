//! Host syscall interface. When a thread reaches the syscall breakpoint the
//! interpreter hands its register file to this handler; the call number is
//! in r0, arguments in r1-r3 and the result goes back in r0. Execution
//! resumes at the link register.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};

use xcsim_isa::Register;

use crate::resource::ThreadRef;
use crate::system::SystemState;

/// Call numbers understood by the handler.
pub mod nr {
    pub const EXIT: u32 = 0;
    pub const PRINTC: u32 = 1;
    pub const PRINTINT: u32 = 2;
    pub const OPEN: u32 = 3;
    pub const CLOSE: u32 = 4;
    pub const READ: u32 = 5;
    pub const WRITE: u32 = 6;
    pub const SEEK: u32 = 7;
    pub const ARGC: u32 = 8;
    pub const ARGV: u32 = 9;
    pub const IS_SIMULATION: u32 = 99;
}

/// `OPEN` flag bits.
pub mod open_flags {
    pub const RDONLY: u32 = 0;
    pub const WRONLY: u32 = 1;
    pub const RDWR: u32 = 2;
    pub const ACCESS_MASK: u32 = 3;
    pub const CREAT: u32 = 0x100;
    pub const TRUNC: u32 = 0x200;
    pub const APPEND: u32 = 0x400;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallOutcome {
    /// r0 holds the result; resume at the link register.
    Continue,
    Exit(i32),
}

/// Host-side state: guest command line and the descriptor table.
#[derive(Debug, Default)]
pub struct SyscallHandler {
    pub cmdline: Vec<String>,
    files: HashMap<i32, File>,
    next_fd: i32,
    /// Divert standard output into a buffer instead of the host's stdout
    /// (used by tests and by tracers that capture guest output).
    pub capture_output: bool,
    pub captured: Vec<u8>,
}

impl SyscallHandler {
    pub fn set_cmdline(&mut self, args: Vec<String>) {
        self.cmdline = args;
    }

    fn alloc_fd(&mut self, file: File) -> i32 {
        // 0..=2 are the standard streams.
        if self.next_fd < 3 {
            self.next_fd = 3;
        }
        let fd = self.next_fd;
        self.next_fd += 1;
        self.files.insert(fd, file);
        fd
    }

    fn write_stdout(&mut self, bytes: &[u8]) {
        if self.capture_output {
            self.captured.extend_from_slice(bytes);
        } else {
            let _ = std::io::stdout().write_all(bytes);
            let _ = std::io::stdout().flush();
        }
    }
}

fn read_c_string(sys: &SystemState, core: usize, mut addr: u32) -> Option<String> {
    let mut out = Vec::new();
    loop {
        let phys = sys.cores[core].physical(addr);
        if !sys.cores[core].check_addr(phys) {
            return None;
        }
        let byte = sys.cores[core].load_byte(phys);
        if byte == 0 {
            break;
        }
        out.push(byte);
        addr = addr.wrapping_add(1);
        if out.len() > 4096 {
            return None;
        }
    }
    String::from_utf8(out).ok()
}

pub(crate) fn handle(sys: &mut SystemState, tref: ThreadRef) -> SyscallOutcome {
    use Register::*;
    let core = tref.core as usize;
    let t = sys.thread(tref);
    let (num, r1, r2, r3) = (t.reg(R0), t.reg(R1), t.reg(R2), t.reg(R3));
    let result: u32 = match num {
        nr::EXIT => {
            sys.trace(|tr, s| tr.syscall(s, tref, "exit", Some(r1)));
            return SyscallOutcome::Exit(r1 as i32);
        }
        nr::PRINTC => {
            sys.trace(|tr, s| tr.syscall(s, tref, "printc", Some(r1)));
            sys.syscalls.write_stdout(&[r1 as u8]);
            0
        }
        nr::PRINTINT => {
            sys.trace(|tr, s| tr.syscall(s, tref, "printint", Some(r1)));
            let text = (r1 as i32).to_string();
            sys.syscalls.write_stdout(text.as_bytes());
            0
        }
        nr::OPEN => {
            sys.trace(|tr, s| tr.syscall(s, tref, "open", Some(r1)));
            match read_c_string(sys, core, r1) {
                Some(path) => do_open(sys, &path, r2),
                None => -1i32 as u32,
            }
        }
        nr::CLOSE => {
            sys.trace(|tr, s| tr.syscall(s, tref, "close", Some(r1)));
            let fd = r1 as i32;
            if fd < 3 || sys.syscalls.files.remove(&fd).is_some() {
                0
            } else {
                -1i32 as u32
            }
        }
        nr::READ => {
            sys.trace(|tr, s| tr.syscall(s, tref, "read", Some(r1)));
            do_read(sys, core, r1 as i32, r2, r3)
        }
        nr::WRITE => {
            sys.trace(|tr, s| tr.syscall(s, tref, "write", Some(r1)));
            do_write(sys, core, r1 as i32, r2, r3)
        }
        nr::SEEK => {
            sys.trace(|tr, s| tr.syscall(s, tref, "seek", Some(r1)));
            match sys.syscalls.files.get_mut(&(r1 as i32)) {
                Some(file) => match file.seek(SeekFrom::Start(r2 as u64)) {
                    Ok(pos) => pos as u32,
                    Err(_) => -1i32 as u32,
                },
                None => -1i32 as u32,
            }
        }
        nr::ARGC => {
            sys.trace(|tr, s| tr.syscall(s, tref, "argc", None));
            sys.syscalls.cmdline.len() as u32
        }
        nr::ARGV => {
            sys.trace(|tr, s| tr.syscall(s, tref, "argv", Some(r1)));
            do_argv(sys, core, r1, r2, r3)
        }
        nr::IS_SIMULATION => 1,
        _ => {
            sys.trace(|tr, s| tr.syscall(s, tref, "unknown", Some(num)));
            -1i32 as u32
        }
    };
    sys.thread_mut(tref).set_reg(R0, result);
    SyscallOutcome::Continue
}

fn do_open(sys: &mut SystemState, path: &str, flags: u32) -> u32 {
    use open_flags::*;
    let mut options = OpenOptions::new();
    match flags & ACCESS_MASK {
        RDONLY => options.read(true),
        WRONLY => options.write(true),
        _ => options.read(true).write(true),
    };
    if flags & CREAT != 0 {
        options.create(true);
    }
    if flags & TRUNC != 0 {
        options.truncate(true);
    }
    if flags & APPEND != 0 {
        options.append(true);
    }
    match options.open(path) {
        Ok(file) => sys.syscalls.alloc_fd(file) as u32,
        Err(err) => {
            tracing::debug!(path, %err, "guest open failed");
            -1i32 as u32
        }
    }
}

fn do_read(sys: &mut SystemState, core: usize, fd: i32, buf: u32, count: u32) -> u32 {
    let mut data = vec![0u8; count as usize];
    let n = if fd == 0 {
        match std::io::stdin().read(&mut data) {
            Ok(n) => n,
            Err(_) => return -1i32 as u32,
        }
    } else {
        match sys.syscalls.files.get_mut(&fd) {
            Some(file) => match file.read(&mut data) {
                Ok(n) => n,
                Err(_) => return -1i32 as u32,
            },
            None => return -1i32 as u32,
        }
    };
    if !sys.cores[core].write_block(buf, &data[..n]) {
        return -1i32 as u32;
    }
    n as u32
}

fn do_write(sys: &mut SystemState, core: usize, fd: i32, buf: u32, count: u32) -> u32 {
    let Some(data) = sys.cores[core].read_block(buf, count as usize).map(<[u8]>::to_vec) else {
        return -1i32 as u32;
    };
    match fd {
        1 => {
            sys.syscalls.write_stdout(&data);
            count
        }
        2 => {
            let _ = std::io::stderr().write_all(&data);
            count
        }
        _ => match sys.syscalls.files.get_mut(&fd) {
            Some(file) => match file.write(&data) {
                Ok(n) => n as u32,
                Err(_) => -1i32 as u32,
            },
            None => -1i32 as u32,
        },
    }
}

fn do_argv(sys: &mut SystemState, core: usize, index: u32, buf: u32, size: u32) -> u32 {
    let Some(arg) = sys.syscalls.cmdline.get(index as usize).cloned() else {
        return -1i32 as u32;
    };
    let mut bytes = arg.into_bytes();
    bytes.push(0);
    if bytes.len() > size as usize || !sys.cores[core].write_block(buf, &bytes) {
        return -1i32 as u32;
    }
    bytes.len() as u32 - 1
}

/// The exception breakpoint fired: report the trap and stop.
pub(crate) fn report_trap(sys: &mut SystemState, tref: ThreadRef) -> i32 {
    use Register::*;
    let t = sys.thread(tref);
    let (et, ed, spc) = (t.reg(Et), t.reg(Ed), t.reg(Spc));
    let kind = match et {
        crate::exec::et::LINK_ERROR => "LINK_ERROR",
        crate::exec::et::ILLEGAL_PC => "ILLEGAL_PC",
        crate::exec::et::ILLEGAL_INSTRUCTION => "ILLEGAL_INSTRUCTION",
        crate::exec::et::ILLEGAL_RESOURCE => "ILLEGAL_RESOURCE",
        crate::exec::et::LOAD_STORE => "LOAD_STORE",
        crate::exec::et::ILLEGAL_PS => "ILLEGAL_PS",
        crate::exec::et::ARITHMETIC => "ARITHMETIC",
        crate::exec::et::ECALL => "ECALL",
        _ => "UNKNOWN",
    };
    tracing::error!(
        thread = tref.num,
        et = kind,
        ed = format_args!("{ed:#010x}"),
        spc = format_args!("{spc:#010x}"),
        "unhandled trap"
    );
    sys.trace(|tr, s| tr.syscall(s, tref, "trap", Some(et)));
    1
}
