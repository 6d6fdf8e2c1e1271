//! Passengers and their health state.
//!
//! A passenger is either susceptible, incubating, or contagious. There is no
//! recovered state: once contagious, a passenger stays contagious for the
//! rest of the simulation.
use std::fmt;

/// Number of seats per row, lettered A through F.
pub const SEATS_PER_ROW: usize = 6;

/// Identifies a passenger within the pool of a single flight. The same
/// number on two flights does not refer to the same traveler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PassengerId(pub usize);

impl fmt::Display for PassengerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A (row, column) pair; columns are `0..SEATS_PER_ROW`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Seat {
    pub row: usize,
    pub column: usize,
}

impl Seat {
    #[must_use]
    pub fn new(row: usize, column: usize) -> Seat {
        debug_assert!(column < SEATS_PER_ROW);
        Seat { row, column }
    }

    /// Absolute column distance between two seats, ignoring rows.
    #[must_use]
    pub fn column_distance(self, other: Seat) -> usize {
        self.column.abs_diff(other.column)
    }
}

impl fmt::Display for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = b"ABCDEF".get(self.column).map_or('?', |b| char::from(*b));
        write!(f, "{}{}", self.row + 1, letter)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HealthState {
    Susceptible,
    Incubating,
    Contagious,
}

/// What caused a passenger to become infected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InfectionSource {
    /// Marked infected when the flight boarded.
    Seeded,
    /// Airborne transmission from a same-row neighbor.
    Proximity,
    /// Contaminated lavatory surfaces.
    Lavatory,
}

impl InfectionSource {
    /// Seeded infections are not counted as new infections on the flight.
    #[must_use]
    pub fn is_in_flight(self) -> bool {
        !matches!(self, InfectionSource::Seeded)
    }
}

/// Remaining itinerary legs, drawn with these weights for 0, 1 and 2.
pub const CONNECTION_WEIGHTS: [f64; 3] = [0.3, 0.5, 0.2];

#[derive(Debug, Clone, PartialEq)]
pub struct Passenger {
    pid: PassengerId,
    state: HealthState,
    newly_infected: bool,
    seat: Option<Seat>,
    connections_left: u8,
}

impl Passenger {
    #[must_use]
    pub fn new(pid: PassengerId, connections_left: u8) -> Passenger {
        Passenger {
            pid,
            state: HealthState::Susceptible,
            newly_infected: false,
            seat: None,
            connections_left,
        }
    }

    /// A passenger who is already past incubation when the simulation starts.
    #[must_use]
    pub fn index_case(pid: PassengerId, connections_left: u8) -> Passenger {
        Passenger {
            state: HealthState::Contagious,
            ..Passenger::new(pid, connections_left)
        }
    }

    #[must_use]
    pub fn pid(&self) -> PassengerId {
        self.pid
    }

    #[must_use]
    pub fn state(&self) -> HealthState {
        self.state
    }

    #[must_use]
    pub fn seat(&self) -> Option<Seat> {
        self.seat
    }

    pub(crate) fn assign_seat(&mut self, seat: Seat) {
        self.seat = Some(seat);
    }

    /// Sampled for every passenger but not consulted by any transition.
    #[must_use]
    pub fn connections_left(&self) -> u8 {
        self.connections_left
    }

    #[must_use]
    pub fn is_infected(&self) -> bool {
        self.state != HealthState::Susceptible
    }

    #[must_use]
    pub fn is_incubating(&self) -> bool {
        self.state == HealthState::Incubating
    }

    #[must_use]
    pub fn is_contagious(&self) -> bool {
        self.state == HealthState::Contagious
    }

    #[must_use]
    pub fn is_newly_infected(&self) -> bool {
        self.newly_infected
    }

    /// True only for a passenger no infection event has touched.
    #[must_use]
    pub fn can_be_infected(&self) -> bool {
        !(self.is_infected()
            || self.is_incubating()
            || self.is_newly_infected()
            || self.is_contagious())
    }

    /// Moves a susceptible passenger into incubation. Returns `false`, and
    /// changes nothing, if the passenger was already touched by an infection.
    pub(crate) fn infect(&mut self, source: InfectionSource) -> bool {
        if !self.can_be_infected() {
            return false;
        }
        self.state = HealthState::Incubating;
        self.newly_infected = source.is_in_flight();
        true
    }

    /// Ends incubation. A no-op for anyone who is not incubating.
    pub(crate) fn finish_incubation(&mut self) -> bool {
        if self.state != HealthState::Incubating {
            return false;
        }
        self.state = HealthState::Contagious;
        true
    }
}
