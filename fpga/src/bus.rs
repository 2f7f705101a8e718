/// Access to the 16 bit FPGA register file.
///
/// Register accesses cannot fail. Reads may have side effects (FIFO data
/// registers pop one sample per read).
pub trait RegisterBus {
    fn write(&mut self, addr: u16, value: u16);
    fn read(&mut self, addr: u16) -> u16;
}

impl<T: RegisterBus + ?Sized> RegisterBus for &mut T {
    fn write(&mut self, addr: u16, value: u16) {
        T::write(self, addr, value)
    }

    fn read(&mut self, addr: u16) -> u16 {
        T::read(self, addr)
    }
}

/// FPGA registers mapped through the FMC NOR/SRAM bank.
///
/// Register `addr` is the 16 bit word at `BASE + (addr << 1)`.
pub struct Fmc {
    base: *mut u16,
}

impl Fmc {
    /// Bank 2 of the FMC NOR/SRAM region.
    pub const BASE: usize = 0x6400_0000;

    /// Create the bus at [`Fmc::BASE`].
    ///
    /// # Safety
    /// The FMC bank must be configured for 16 bit asynchronous access and
    /// the register window must not be accessed through any other handle.
    pub unsafe fn new() -> Self {
        Self::with_base(Self::BASE as *mut u16)
    }

    /// # Safety
    /// See [`Fmc::new`]. `base` must point to the register window.
    pub unsafe fn with_base(base: *mut u16) -> Self {
        Self { base }
    }
}

impl RegisterBus for Fmc {
    fn write(&mut self, addr: u16, value: u16) {
        // Note(unsafe): The window is exclusively owned and covers the full
        // 16 bit word address range.
        unsafe {
            core::ptr::write_volatile(self.base.add(addr as usize), value)
        }
    }

    fn read(&mut self, addr: u16) -> u16 {
        // Note(unsafe): See `write()`.
        unsafe { core::ptr::read_volatile(self.base.add(addr as usize)) }
    }
}
