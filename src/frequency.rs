//! Frequency inference: assign a consistent core frequency per process.

#![forbid(unsafe_code)]

use crate::contract::{assert_invariant, FREQUENCIES_CONSISTENT};
use crate::error::{PipelineError, Result};
use crate::pipeline::Pipeline;
use crate::port::{Connection, Name};
use crate::rational::{lcm, Rational};
use std::collections::{BTreeMap, VecDeque};
use tracing::{debug, trace};

impl Pipeline {
    /// Compute a rational execution frequency per process from per-port
    /// frequency ratios, then normalize denominators so every core
    /// frequency is an integer over the smallest common time base.
    ///
    /// For every resolved connection with both port frequencies declared,
    /// the assignment satisfies `freq(up) * upPortFreq ==
    /// freq(down) * downPortFreq`; connections with an undeclared port
    /// frequency cannot be validated and are skipped.
    pub(crate) fn solve_frequencies(&mut self) -> Result<()> {
        let names = self.process_names();

        if names.len() == 1 {
            let only = self.process_by_name(&names[0])?;
            only.borrow_mut().set_core_frequency(Rational::ONE);
            return Ok(());
        }

        let mut freq_map: BTreeMap<Name, Rational> = BTreeMap::new();
        let mut queue: VecDeque<Connection> = self.book.resolved.iter().cloned().collect();

        // Connections requeued since the last assignment. Once a full lap
        // of the queue makes no progress, the remainder is a frequency
        // island bridged only by unvalidatable edges; seed it and go on.
        let mut stalled = 0usize;

        while let Some(connection) = queue.pop_front() {
            let up_proc = self.process_by_name(&connection.upstream.name)?;
            let down_proc = self.process_by_name(&connection.downstream.name)?;

            let up_port_freq = up_proc
                .borrow()
                .output_port_info(&connection.upstream.port)?
                .frequency;
            let down_port_freq = down_proc
                .borrow()
                .input_port_info(&connection.downstream.port)?
                .frequency;

            let (up_port_freq, down_port_freq) = match (up_port_freq, down_port_freq) {
                (Some(up), Some(down)) => (up, down),
                _ => {
                    trace!(%connection, "edge frequency cannot be validated");
                    continue;
                }
            };

            let mut have_upstream = freq_map.contains_key(&connection.upstream.name);
            let have_downstream = freq_map.contains_key(&connection.downstream.name);

            if !have_upstream && !have_downstream {
                if freq_map.is_empty() || stalled > queue.len() {
                    // Seed at 1-to-1 based on the upstream process.
                    freq_map.insert(connection.upstream.name.clone(), Rational::ONE);
                    have_upstream = true;
                    stalled = 0;
                } else {
                    stalled += 1;
                    queue.push_back(connection);
                    continue;
                }
            }

            if have_upstream && have_downstream {
                // Validate the connection.
                let up_proc_freq = freq_map[&connection.upstream.name];
                let down_proc_freq = freq_map[&connection.downstream.name];

                let edge_freq = up_proc_freq * up_port_freq;
                let expect_freq = edge_freq / down_port_freq;

                if down_proc_freq != expect_freq {
                    return Err(PipelineError::FrequencyMismatch {
                        up_name: connection.upstream.name,
                        up_port: connection.upstream.port,
                        up_frequency: up_proc_freq,
                        down_name: connection.downstream.name,
                        down_port: connection.downstream.port,
                        down_frequency: down_proc_freq,
                    });
                }
            } else if have_upstream {
                // Propagate the frequency downstream.
                let up_proc_freq = freq_map[&connection.upstream.name];
                let expect_freq = (up_proc_freq * up_port_freq) / down_port_freq;

                freq_map.insert(connection.downstream.name.clone(), expect_freq);
                stalled = 0;
            } else {
                // Propagate the frequency upstream.
                let down_proc_freq = freq_map[&connection.downstream.name];
                let expect_freq = (down_proc_freq * down_port_freq) / up_port_freq;

                freq_map.insert(connection.upstream.name.clone(), expect_freq);
                stalled = 0;
            }
        }

        // Processes with no validatable edge at all still get a base rate.
        for name in &names {
            freq_map.entry(name.clone()).or_insert(Rational::ONE);
        }

        let time_base = freq_map
            .values()
            .fold(1u64, |acc, freq| lcm(acc, freq.denominator()));

        debug!(time_base, "normalizing core frequencies");

        for (name, freq) in &freq_map {
            let core_freq = time_base * *freq;
            let proc = self.process_by_name(name)?;
            proc.borrow_mut().set_core_frequency(core_freq);
        }

        assert_invariant(
            FREQUENCIES_CONSISTENT,
            freq_map.len() == names.len(),
            "Every process assigned a core frequency",
            Some("solve_frequencies"),
        );

        Ok(())
    }
}
