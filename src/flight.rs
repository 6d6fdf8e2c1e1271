//! A single flight: its seating, its passengers, and the process that runs
//! from departure to landing.
//!
//! Flights board as soon as they are spawned, which for a follow-on flight is
//! the landing time of the flight that feeds it. Boarding builds a fresh pool
//! of `occupancy` passengers, seats them at random, and marks a random subset
//! of them infected, one per seed passenger carried in from the previous leg.
//! Only the *number* of seed passengers matters here: the carried-over
//! travelers are not mapped onto particular seats of the new flight.
//!
//! The cabin processes start at departure and run while the simulation
//! clock is below the flight's duration. The clock is absolute, so a flight
//! departing at or after its own duration has no row checks and no lavatory
//! visits at all.
use std::collections::BTreeMap;
use std::fmt;

use log::debug;

use crate::context::Context;
use crate::error::SimError;
use crate::infection_manager::seed_infection;
use crate::lavatory::{start_lavatory_visits, Lavatory};
use crate::passenger::{Passenger, PassengerId, Seat, CONNECTION_WEIGHTS, SEATS_PER_ROW};
use crate::proximity::start_row_checks;
use crate::random::{sample_without_replacement, ContextRandomExt};
use crate::{define_data_plugin, define_rng};

define_rng!(SeatingRng);
define_rng!(SeedingRng);
define_rng!(ConnectionsRng);

/// Flight numbers start at 1 and increase in spawn order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FlightId(pub usize);

impl FlightId {
    fn index(self) -> Option<usize> {
        self.0.checked_sub(1)
    }
}

impl fmt::Display for FlightId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightStatus {
    Scheduled,
    Airborne,
    Landed,
}

/// The outcome of a flight, read by the itinerary controller on landing.
#[derive(Debug, Clone, PartialEq)]
pub struct FlightSummary {
    pub flight_id: FlightId,
    pub departure: f64,
    pub duration: f64,
    pub seeded: usize,
    /// Every infected passenger in the flight's pool, in pid order.
    pub infected_pids: Vec<PassengerId>,
    pub new_infections: usize,
    /// Passengers who leave the flight not yet contagious.
    pub not_contagious: usize,
}

impl FlightSummary {
    #[must_use]
    pub fn landing_time(&self) -> f64 {
        self.departure + self.duration
    }
}

/// Random draws needed to board a flight, made before the flight is mutated.
#[derive(Debug, Clone)]
pub struct Boarding {
    pub connections: Vec<u8>,
    pub infected: Vec<usize>,
    pub seats: Vec<Seat>,
}

#[derive(Debug)]
pub struct Flight {
    id: FlightId,
    departure: f64,
    duration: f64,
    occupancy: usize,
    rows: usize,
    status: FlightStatus,
    seed_passengers: Vec<Passenger>,
    passengers: Vec<Passenger>,
    seating: BTreeMap<Seat, PassengerId>,
    row_members: Vec<Vec<PassengerId>>,
    infected_passengers: Vec<PassengerId>,
    new_infected: usize,
    lavatory: Lavatory,
}

/// Rows needed to seat `occupancy` passengers six abreast.
#[must_use]
pub fn rows_for(occupancy: usize) -> usize {
    occupancy.div_ceil(SEATS_PER_ROW)
}

impl Flight {
    #[must_use]
    pub fn new(
        id: FlightId,
        departure: f64,
        duration: f64,
        occupancy: usize,
        seed_passengers: Vec<Passenger>,
    ) -> Flight {
        let rows = rows_for(occupancy);
        Flight {
            id,
            departure,
            duration,
            occupancy,
            rows,
            status: FlightStatus::Scheduled,
            seed_passengers,
            passengers: Vec::new(),
            seating: BTreeMap::new(),
            row_members: vec![Vec::new(); rows],
            infected_passengers: Vec::new(),
            new_infected: 0,
            lavatory: Lavatory::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> FlightId {
        self.id
    }

    #[must_use]
    pub fn departure(&self) -> f64 {
        self.departure
    }

    #[must_use]
    pub fn duration(&self) -> f64 {
        self.duration
    }

    #[must_use]
    pub fn occupancy(&self) -> usize {
        self.occupancy
    }

    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[must_use]
    pub fn status(&self) -> FlightStatus {
        self.status
    }

    #[must_use]
    pub fn is_airborne(&self) -> bool {
        self.status == FlightStatus::Airborne
    }

    /// Whether the cabin processes keep going at virtual time `now`. The
    /// duration is compared with the simulation clock, not with the time
    /// since departure.
    #[must_use]
    pub fn in_progress(&self, now: f64) -> bool {
        self.is_airborne() && now < self.duration
    }

    #[must_use]
    pub fn seed_passengers(&self) -> &[Passenger] {
        &self.seed_passengers
    }

    #[must_use]
    pub fn passengers(&self) -> &[Passenger] {
        &self.passengers
    }

    #[must_use]
    pub fn passenger(&self, pid: PassengerId) -> &Passenger {
        &self.passengers[pid.0]
    }

    #[must_use]
    pub fn seating(&self) -> &BTreeMap<Seat, PassengerId> {
        &self.seating
    }

    /// Passengers seated in `row`, in pid order.
    #[must_use]
    pub fn row(&self, row: usize) -> &[PassengerId] {
        &self.row_members[row]
    }

    #[must_use]
    pub fn infected_passengers(&self) -> &[PassengerId] {
        &self.infected_passengers
    }

    #[must_use]
    pub fn new_infected_count(&self) -> usize {
        self.new_infected
    }

    #[must_use]
    pub fn lavatory(&self) -> &Lavatory {
        &self.lavatory
    }

    pub(crate) fn lavatory_mut(&mut self) -> &mut Lavatory {
        &mut self.lavatory
    }

    /// Draws everything boarding needs.
    ///
    /// # Errors
    ///
    /// Returns a `SamplingError` if there are more seed passengers than
    /// occupants or more occupants than seats.
    pub fn draw_boarding(&self, context: &Context) -> Result<Boarding, SimError> {
        let connections = (0..self.occupancy)
            .map(|_| draw_connections(context))
            .collect::<Result<_, _>>()?;
        let infected = context.sample(SeedingRng, |rng| {
            sample_without_replacement(rng, self.occupancy, self.seed_passengers.len())
        })?;
        let seats = context
            .sample(SeatingRng, |rng| {
                sample_without_replacement(rng, self.rows * SEATS_PER_ROW, self.occupancy)
            })?
            .into_iter()
            .map(|index| Seat::new(index / SEATS_PER_ROW, index % SEATS_PER_ROW))
            .collect();
        Ok(Boarding {
            connections,
            infected,
            seats,
        })
    }

    /// Builds the passenger pool and seats it. Returns the passengers that
    /// must be seeded as infected.
    pub(crate) fn board(&mut self, boarding: Boarding) -> Vec<PassengerId> {
        debug_assert_eq!(self.status, FlightStatus::Scheduled);
        debug_assert!(self.passengers.is_empty());
        debug_assert_eq!(boarding.seats.len(), self.occupancy);

        self.passengers = boarding
            .connections
            .into_iter()
            .enumerate()
            .map(|(pid, connections)| Passenger::new(PassengerId(pid), connections))
            .collect();

        for (passenger, seat) in self.passengers.iter_mut().zip(boarding.seats) {
            passenger.assign_seat(seat);
            self.seating.insert(seat, passenger.pid());
        }
        // Pid order, independent of the seat draw order.
        for passenger in &self.passengers {
            if let Some(seat) = passenger.seat() {
                self.row_members[seat.row].push(passenger.pid());
            }
        }

        boarding.infected.into_iter().map(PassengerId).collect()
    }

    /// Applies an infection to one passenger. Returns whether it took effect.
    pub(crate) fn record_infection(
        &mut self,
        pid: PassengerId,
        source: crate::passenger::InfectionSource,
    ) -> bool {
        if !self.passengers[pid.0].infect(source) {
            return false;
        }
        if source.is_in_flight() {
            self.infected_passengers.push(pid);
            self.new_infected += 1;
        }
        true
    }

    pub(crate) fn finish_incubation(&mut self, pid: PassengerId) -> bool {
        self.passengers[pid.0].finish_incubation()
    }

    pub(crate) fn depart(&mut self) {
        debug_assert_eq!(self.status, FlightStatus::Scheduled);
        self.status = FlightStatus::Airborne;
    }

    pub(crate) fn land(&mut self) {
        self.status = FlightStatus::Landed;
    }

    #[must_use]
    pub fn summary(&self) -> FlightSummary {
        FlightSummary {
            flight_id: self.id,
            departure: self.departure,
            duration: self.duration,
            seeded: self.seed_passengers.len(),
            infected_pids: self
                .passengers
                .iter()
                .filter(|p| p.is_infected())
                .map(Passenger::pid)
                .collect(),
            new_infections: self
                .passengers
                .iter()
                .filter(|p| p.is_newly_infected())
                .count(),
            not_contagious: self
                .passengers
                .iter()
                .filter(|p| !p.is_contagious())
                .count(),
        }
    }
}

/// Samples 0, 1 or 2 remaining connections.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn draw_connections(context: &Context) -> Result<u8, SimError> {
    Ok(context.sample_weighted(ConnectionsRng, &CONNECTION_WEIGHTS)? as u8)
}

#[derive(Debug, Default)]
pub struct FlightRegistry {
    flights: Vec<Flight>,
}

define_data_plugin!(FlightsPlugin, FlightRegistry, FlightRegistry::default());

pub trait ContextFlightsExt {
    /// Registers a flight in `Scheduled` state and returns its id.
    fn register_flight(
        &mut self,
        departure: f64,
        duration: f64,
        occupancy: usize,
        seed_passengers: Vec<Passenger>,
    ) -> FlightId;

    /// # Panics
    ///
    /// Panics if `id` was never registered on this context.
    fn flight(&self, id: FlightId) -> &Flight;

    /// # Panics
    ///
    /// Panics if `id` was never registered on this context.
    fn flight_mut(&mut self, id: FlightId) -> &mut Flight;

    /// Number of flights spawned so far, whether or not they have flown.
    fn flight_count(&self) -> usize;
}

impl ContextFlightsExt for Context {
    fn register_flight(
        &mut self,
        departure: f64,
        duration: f64,
        occupancy: usize,
        seed_passengers: Vec<Passenger>,
    ) -> FlightId {
        let registry = self.get_data_mut(FlightsPlugin);
        let id = FlightId(registry.flights.len() + 1);
        registry.flights.push(Flight::new(
            id,
            departure,
            duration,
            occupancy,
            seed_passengers,
        ));
        id
    }

    fn flight(&self, id: FlightId) -> &Flight {
        self.get_data(FlightsPlugin)
            .and_then(|registry| registry.flights.get(id.index()?))
            .unwrap_or_else(|| panic!("unknown flight {id}"))
    }

    fn flight_mut(&mut self, id: FlightId) -> &mut Flight {
        let flights = &mut self.get_data_mut(FlightsPlugin).flights;
        match id.index() {
            Some(index) if index < flights.len() => &mut flights[index],
            _ => panic!("unknown flight {id}"),
        }
    }

    fn flight_count(&self) -> usize {
        self.get_data(FlightsPlugin)
            .map_or(0, |registry| registry.flights.len())
    }
}

/// Seats a scheduled flight and seeds its infections. The seeded passengers'
/// incubation timers start now, not at departure.
///
/// # Errors
///
/// Returns a `SamplingError` if the flight cannot be filled from its pool.
pub fn board_flight(context: &mut Context, flight_id: FlightId) -> Result<(), SimError> {
    let boarding = context.flight(flight_id).draw_boarding(context)?;
    let seeded = context.flight_mut(flight_id).board(boarding);
    debug!(
        "flight {flight_id} boarded at {:.1} with {} seeded infections",
        context.get_current_time(),
        seeded.len()
    );

    for pid in seeded {
        seed_infection(context, flight_id, pid);
    }
    Ok(())
}

/// Takes off a boarded flight and starts its cabin processes: one lavatory
/// loop per passenger and the periodic row check.
pub fn depart_flight(context: &mut Context, flight_id: FlightId) {
    context.flight_mut(flight_id).depart();
    debug!(
        "flight {flight_id} departed at {:.1}",
        context.get_current_time()
    );

    let occupancy = context.flight(flight_id).occupancy();
    for pid in (0..occupancy).map(PassengerId) {
        start_lavatory_visits(context, flight_id, pid);
    }
    start_row_checks(context, flight_id);
}
