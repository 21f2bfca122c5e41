use basins::exchange::{self, Scheme};
use basins::prelude::*;

/// Simulates a round lake parameterised from field conditions and writes the steady profile.
fn main() -> Result<(), BasinError> {
    pretty_env_logger::init();

    // Field conditions on the sampling day.
    let temps = vec![18.2, 18.5, 18.9, 19.1]; // Surface water temperature along the transect (°C).
    let u10 = 2.8; // Wind speed at 10 m (m/s).
    let area = 0.8; // Lake area (km²).
    let k600 = exchange::k600(u10, area);

    let lake = Lake::new()
        .radius(500.0)?
        .inner_radius(300.0)?
        .mixed_depth(4.5)?
        .kh(exchange::horizontal_diffusivity(1000.0, Scheme::PeetersHofmann))?
        .kch4(exchange::kch4(&temps, k600, u10))?
        .kz(2e-7)? // Vertical exchange across the thermocline (m/s).
        .c_hyp(1.5)?
        .hcp(exchange::henry(utils::mean(&temps)))?
        .patm(0.19)?;

    // Bubble dissolution measured with an echosounder, per radius band.
    let bubbles = Dissolution::new(&[(300.0, 50.0), (400.0, 400.0), (480.0, 900.0)])?;

    let run = Transport::new()
        .lake(lake)
        .sources(
            Sources::new()
                .sediment(2.5) // Littoral sediment flux.
                .production(20.0) // Oxic methane production.
                .dissolution(bubbles),
        )
        .solver(Solver::new().dr(5.0)?.dt(0.5)?.t_end(365.0)?);

    let profile = run.simulate()?;
    println!(
        "Mean concentration {:.3} µmol/l, flux {:.4}, {:?}",
        profile.mean(),
        profile.flux,
        profile.termination
    );
    // Change directory path for user.
    utils::record(&profile.rows(), "round_lake_profile.csv")?;
    Ok(())
}
