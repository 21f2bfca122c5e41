use basins::prelude::*;

/// Fits the littoral sediment flux to a noisy transect and bootstraps its spread.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();

    let solver = Solver::new().dr(10.0)?.dt(0.5)?.t_end(1000.0)?.tolerance(1e-8)?;
    let lake = Lake::new().kch4(0.8)?;
    let truth = Transport::new()
        .lake(lake)
        .sources(Sources::new().sediment(1.6).production(30.0))
        .solver(solver);

    // Stations every 25 m from the shore, the last one recorded past the centre.
    let mut stations: Vec<f64> = (0..20).map(|i| i as f64 * 25.0).collect();
    stations.push(515.0);
    let obs = Transect::synthetic(&truth, &stations, 0.02, 1004)?;

    let start = FitVariable::Sediment.apply(&truth, 0.5)?;
    let cal = Calibrator::new(start, obs.clone(), FitVariable::Sediment);
    let fit = cal.calibrate()?;
    println!(
        "{} = {:.3} ± {:.3}",
        fit.variable.name(),
        fit.value,
        fit.variance.sqrt()
    );

    let boot = cal.bootstrap(50, 1004)?;
    println!("bootstrap quantiles {:?}", utils::quantiles(&boot));

    // Change directory path for user.
    plot::comp_profile(&fit.profile, &obs, "fit_sediment.png")?;
    Ok(())
}
