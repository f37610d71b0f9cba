use crate::mmu::IF_TIMER;

/// Machine cycles per DIV increment.
const DIV_PERIOD: u32 = 16;

/// Divider/timer peripheral (0xFF04..=0xFF07).
pub struct Timer {
    /// Free-running divider, incremented every 16 machine cycles.
    pub div: u8,
    /// Timer counter
    pub tima: u8,
    /// Timer modulo
    pub tma: u8,
    /// Timer control
    pub tac: u8,
    div_clock: u32,
    tima_clock: u32,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            div: 0,
            tima: 0,
            tma: 0,
            tac: 0,
            div_clock: 0,
            tima_clock: 0,
        }
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            0xFF04 => self.div,
            0xFF05 => self.tima,
            0xFF06 => self.tma,
            0xFF07 => self.tac,
            _ => 0,
        }
    }

    pub fn write(&mut self, addr: u16, val: u8) {
        match addr {
            0xFF04 => {
                // Any write clears the divider.
                self.div = 0;
                self.div_clock = 0;
            }
            0xFF05 => self.tima = val,
            0xFF06 => self.tma = val,
            0xFF07 => self.tac = val & 0x07,
            _ => {}
        }
    }

    /// Machine cycles per TIMA increment for the current rate select.
    fn tima_period(&self) -> u32 {
        match self.tac & 0x03 {
            0 => 256,
            1 => 4,
            2 => 16,
            _ => 64,
        }
    }

    /// Advance the timer by `cycles` machine cycles, raising the timer
    /// interrupt on TIMA overflow.
    pub fn step(&mut self, cycles: u32, if_reg: &mut u8) {
        self.div_clock += cycles;
        while self.div_clock >= DIV_PERIOD {
            self.div_clock -= DIV_PERIOD;
            self.div = self.div.wrapping_add(1);
        }

        if self.tac & 0x04 == 0 {
            return;
        }
        self.tima_clock += cycles;
        let period = self.tima_period();
        while self.tima_clock >= period {
            self.tima_clock -= period;
            if self.tima == 0xFF {
                self.tima = self.tma;
                *if_reg |= IF_TIMER;
            } else {
                self.tima += 1;
            }
        }
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn div_increments_every_16_cycles() {
        let mut timer = Timer::new();
        let mut if_reg = 0;
        timer.step(15, &mut if_reg);
        assert_eq!(timer.read(0xFF04), 0);
        timer.step(1, &mut if_reg);
        assert_eq!(timer.read(0xFF04), 1);
        timer.step(160, &mut if_reg);
        assert_eq!(timer.read(0xFF04), 11);
    }

    #[test]
    fn div_runs_while_timer_disabled() {
        let mut timer = Timer::new();
        let mut if_reg = 0;
        timer.write(0xFF07, 0x00);
        timer.step(256, &mut if_reg);
        assert_eq!(timer.read(0xFF04), 16);
        assert_eq!(timer.read(0xFF05), 0);
    }

    #[test]
    fn div_write_resets_counter() {
        let mut timer = Timer::new();
        let mut if_reg = 0;
        timer.step(40, &mut if_reg);
        timer.write(0xFF04, 0xAB);
        assert_eq!(timer.read(0xFF04), 0);
    }

    #[test]
    fn tima_rate_select() {
        for (select, period) in [(0u8, 256u32), (1, 4), (2, 16), (3, 64)] {
            let mut timer = Timer::new();
            let mut if_reg = 0;
            timer.write(0xFF07, 0x04 | select);
            timer.step(period - 1, &mut if_reg);
            assert_eq!(timer.read(0xFF05), 0, "select {select}");
            timer.step(1, &mut if_reg);
            assert_eq!(timer.read(0xFF05), 1, "select {select}");
        }
    }

    #[test]
    fn overflow_reloads_from_tma_and_raises_interrupt() {
        let mut timer = Timer::new();
        let mut if_reg = 0;
        timer.write(0xFF07, 0x05); // enabled, 4-cycle rate
        timer.write(0xFF06, 0x23);
        timer.write(0xFF05, 0xFF);
        timer.step(4, &mut if_reg);
        assert_eq!(timer.read(0xFF05), 0x23);
        assert_eq!(if_reg & IF_TIMER, IF_TIMER);
    }
}
