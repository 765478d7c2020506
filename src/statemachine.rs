//! The 16-state JTAG TAP graph plus the two sentinel values the cold-start
//! path and JED translator need. `TapEngine::set_state` walks the minimal
//! known path from whatever state the TAP is currently in to the requested
//! target, pushing edges into a [`crate::buffer::TxRxBuffer`] as it goes.
use crate::buffer::TxRxBuffer;
use crate::error::{ProgError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TapState {
    Reset,
    Idle,
    DrSelect,
    DrCapture,
    DrShift,
    DrExit1,
    DrPause,
    DrExit2,
    DrUpdate,
    IrSelect,
    IrCapture,
    IrShift,
    IrExit1,
    IrPause,
    IrExit2,
    IrUpdate,
    /// No transition has been made yet; only a reset-then-normal-graph route
    /// out of this state is legal.
    Undefined,
}

impl TapState {
    pub fn name(&self) -> &'static str {
        match self {
            TapState::Reset => "RESET",
            TapState::Idle => "IDLE",
            TapState::DrSelect => "DRSELECT",
            TapState::DrCapture => "DRCAPTURE",
            TapState::DrShift => "DRSHIFT",
            TapState::DrExit1 => "DREXIT1",
            TapState::DrPause => "DRPAUSE",
            TapState::DrExit2 => "DREXIT2",
            TapState::DrUpdate => "DRUPDATE",
            TapState::IrSelect => "IRSELECT",
            TapState::IrCapture => "IRCAPTURE",
            TapState::IrShift => "IRSHIFT",
            TapState::IrExit1 => "IREXIT1",
            TapState::IrPause => "IRPAUSE",
            TapState::IrExit2 => "IREXIT2",
            TapState::IrUpdate => "IRUPDATE",
            TapState::Undefined => "UNDEFINED",
        }
    }

    /// Parse an SVF state name. Returns `None` for a name this TAP graph
    /// doesn't recognise (the `UNSUPPORTED` sentinel from the spec's data
    /// model); callers turn that into a `BadSvf`/`Invalid` error.
    pub fn from_svf_name(name: &str) -> Option<TapState> {
        Some(match name {
            "RESET" => TapState::Reset,
            "IDLE" => TapState::Idle,
            "DRSELECT" => TapState::DrSelect,
            "DRCAPTURE" => TapState::DrCapture,
            "DRSHIFT" => TapState::DrShift,
            "DREXIT1" => TapState::DrExit1,
            "DRPAUSE" => TapState::DrPause,
            "DREXIT2" => TapState::DrExit2,
            "DRUPDATE" => TapState::DrUpdate,
            "IRSELECT" => TapState::IrSelect,
            "IRCAPTURE" => TapState::IrCapture,
            "IRSHIFT" => TapState::IrShift,
            "IREXIT1" => TapState::IrExit1,
            "IRPAUSE" => TapState::IrPause,
            "IREXIT2" => TapState::IrExit2,
            "IRUPDATE" => TapState::IrUpdate,
            "UNDEFINED" => TapState::Undefined,
            _ => return None,
        })
    }
}

/// Tracks the TAP's current state and computes/emits the TMS sequence
/// needed to reach any other state, per the waypoint table in ujprog.c's
/// `set_state()`.
pub struct TapEngine {
    cur: TapState,
}

impl Default for TapEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TapEngine {
    pub fn new() -> Self {
        TapEngine {
            cur: TapState::Undefined,
        }
    }

    pub fn current(&self) -> TapState {
        self.cur
    }

    /// Drive the TAP to `tgt`, recursing through named waypoints as needed.
    /// `buf` receives the TMS/TDI edges (TDI is always held low for mode
    /// changes, per spec.md C3).
    pub fn set_state(&mut self, tgt: TapState, buf: &mut TxRxBuffer) -> Result<()> {
        use TapState::*;

        match tgt {
            Reset => {
                for _ in 0..5 {
                    buf.push_edge(true, false);
                }
            }

            Idle => match self.cur {
                Reset | DrUpdate | IrUpdate | Idle => buf.push_edge(false, false),
                Undefined => {
                    self.set_state(Reset, buf)?;
                    self.set_state(Idle, buf)?;
                }
                DrPause => {
                    self.set_state(DrExit2, buf)?;
                    self.set_state(DrUpdate, buf)?;
                    self.set_state(Idle, buf)?;
                }
                IrPause => {
                    self.set_state(IrExit2, buf)?;
                    self.set_state(IrUpdate, buf)?;
                    self.set_state(Idle, buf)?;
                }
                other => return Err(self.stuck(other, tgt)),
            },

            DrSelect => match self.cur {
                Idle | DrUpdate | IrUpdate => buf.push_edge(true, false),
                other => return Err(self.stuck(other, tgt)),
            },

            DrCapture => match self.cur {
                DrSelect => buf.push_edge(false, false),
                Idle => {
                    self.set_state(DrSelect, buf)?;
                    self.set_state(DrCapture, buf)?;
                }
                IrPause => {
                    self.set_state(Idle, buf)?;
                    self.set_state(DrSelect, buf)?;
                    self.set_state(DrCapture, buf)?;
                }
                other => return Err(self.stuck(other, tgt)),
            },

            DrExit1 => match self.cur {
                DrCapture => buf.push_edge(true, false),
                other => return Err(self.stuck(other, tgt)),
            },

            DrPause => match self.cur {
                DrExit1 => buf.push_edge(false, false),
                Idle => {
                    self.set_state(DrSelect, buf)?;
                    self.set_state(DrCapture, buf)?;
                    self.set_state(DrExit1, buf)?;
                    self.set_state(DrPause, buf)?;
                }
                IrPause => {
                    self.set_state(IrExit2, buf)?;
                    self.set_state(IrUpdate, buf)?;
                    self.set_state(DrSelect, buf)?;
                    self.set_state(DrCapture, buf)?;
                    self.set_state(DrExit1, buf)?;
                    self.set_state(DrPause, buf)?;
                }
                DrPause => {
                    self.set_state(DrExit2, buf)?;
                    self.set_state(DrUpdate, buf)?;
                    self.set_state(DrSelect, buf)?;
                    self.set_state(DrCapture, buf)?;
                    self.set_state(DrExit1, buf)?;
                    self.set_state(DrPause, buf)?;
                }
                other => return Err(self.stuck(other, tgt)),
            },

            DrExit2 => match self.cur {
                DrPause => buf.push_edge(true, false),
                other => return Err(self.stuck(other, tgt)),
            },

            DrUpdate => match self.cur {
                DrExit2 => buf.push_edge(true, false),
                other => return Err(self.stuck(other, tgt)),
            },

            IrSelect => match self.cur {
                DrSelect => buf.push_edge(true, false),
                other => return Err(self.stuck(other, tgt)),
            },

            IrCapture => match self.cur {
                IrSelect => buf.push_edge(false, false),
                Idle => {
                    self.set_state(DrSelect, buf)?;
                    self.set_state(IrSelect, buf)?;
                    self.set_state(IrCapture, buf)?;
                }
                DrPause => {
                    self.set_state(DrExit2, buf)?;
                    self.set_state(DrUpdate, buf)?;
                    self.set_state(DrSelect, buf)?;
                    self.set_state(IrSelect, buf)?;
                    self.set_state(IrCapture, buf)?;
                }
                other => return Err(self.stuck(other, tgt)),
            },

            IrExit1 => match self.cur {
                IrCapture => buf.push_edge(true, false),
                other => return Err(self.stuck(other, tgt)),
            },

            IrPause => match self.cur {
                IrExit1 => buf.push_edge(false, false),
                Idle => {
                    self.set_state(DrSelect, buf)?;
                    self.set_state(IrSelect, buf)?;
                    self.set_state(IrCapture, buf)?;
                    self.set_state(IrExit1, buf)?;
                    self.set_state(IrPause, buf)?;
                }
                DrPause => {
                    self.set_state(DrExit2, buf)?;
                    self.set_state(DrUpdate, buf)?;
                    self.set_state(DrSelect, buf)?;
                    self.set_state(IrSelect, buf)?;
                    self.set_state(IrCapture, buf)?;
                    self.set_state(IrExit1, buf)?;
                    self.set_state(IrPause, buf)?;
                }
                IrPause => {
                    self.set_state(IrExit2, buf)?;
                    self.set_state(IrUpdate, buf)?;
                    self.set_state(DrSelect, buf)?;
                    self.set_state(IrSelect, buf)?;
                    self.set_state(IrCapture, buf)?;
                    self.set_state(IrExit1, buf)?;
                    self.set_state(IrPause, buf)?;
                }
                other => return Err(self.stuck(other, tgt)),
            },

            IrExit2 => match self.cur {
                IrPause => buf.push_edge(true, false),
                other => return Err(self.stuck(other, tgt)),
            },

            IrUpdate => match self.cur {
                IrExit2 => buf.push_edge(true, false),
                other => return Err(self.stuck(other, tgt)),
            },

            // DRSHIFT/IRSHIFT are reached only by the shift engine's own
            // bit-banging, never by a named-waypoint jump.
            DrShift | IrShift | Undefined => return Err(self.stuck(self.cur, tgt)),
        }

        self.cur = tgt;
        Ok(())
    }

    fn stuck(&self, from: TapState, to: TapState) -> ProgError {
        ProgError::TapStuck {
            from: from.name().to_string(),
            to: to.name().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buf() -> TxRxBuffer {
        TxRxBuffer::new()
    }

    #[test]
    fn reset_from_undefined_is_five_tms_high() {
        let mut e = TapEngine::new();
        let mut b = buf();
        e.set_state(TapState::Reset, &mut b).unwrap();
        assert_eq!(e.current(), TapState::Reset);
        assert_eq!(b.tx().len(), 10);
        for chunk in b.tx().chunks(2) {
            assert_eq!(chunk[0], 0x80);
            assert_eq!(chunk[1], 0x80 | 0x20);
        }
    }

    #[test]
    fn idle_from_reset_is_single_edge() {
        let mut e = TapEngine::new();
        let mut b = buf();
        e.set_state(TapState::Reset, &mut b).unwrap();
        b.clear_tx();
        e.set_state(TapState::Idle, &mut b).unwrap();
        assert_eq!(e.current(), TapState::Idle);
        assert_eq!(b.tx().len(), 2);
    }

    #[test]
    fn drpause_to_irpause_routes_through_other_pause_exit() {
        let mut e = TapEngine::new();
        let mut b = buf();
        e.set_state(TapState::Reset, &mut b).unwrap();
        e.set_state(TapState::Idle, &mut b).unwrap();
        e.set_state(TapState::DrPause, &mut b).unwrap();
        b.clear_tx();
        e.set_state(TapState::IrPause, &mut b).unwrap();
        assert_eq!(e.current(), TapState::IrPause);
        // DREXIT2, DRUPDATE, DRSELECT, IRSELECT, IRCAPTURE, IREXIT1, IRPAUSE
        assert_eq!(b.tx().len(), 14);
    }

    #[test]
    fn unknown_transition_is_tap_stuck() {
        let mut e = TapEngine::new();
        let mut b = buf();
        let err = e.set_state(TapState::DrExit1, &mut b).unwrap_err();
        assert!(matches!(err, ProgError::TapStuck { .. }));
    }
}
