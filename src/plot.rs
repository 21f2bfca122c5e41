//! Charts of modelled profiles against observations.
use crate::model::Profile;
use crate::transect::Transect;
use plotters::prelude::*;

/// Draw a modelled profile against observed concentrations, both over distance from the shore.
pub fn comp_profile(
    profile: &Profile,
    obs: &Transect,
    title: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let model: Vec<(f64, f64)> = profile
        .distance
        .iter()
        .cloned()
        .zip(profile.concentration.iter().cloned())
        .collect();
    let points = obs.points();
    let mut all = model.clone();
    all.extend(points.iter().cloned());

    let ymin = all.iter().map(|xi| xi.1).fold(f64::INFINITY, f64::min).min(0.0);
    let ymax = all.iter().map(|xi| xi.1).fold(0.0, f64::max) * 1.05;
    let xmax = all.iter().map(|xi| xi.0).fold(0.0, f64::max);
    let root = BitMapBackend::new(title, (640, 480)).into_drawing_area();
    root.fill(&WHITE)?;
    root.margin(10, 10, 10, 10);
    let mut chart = ChartBuilder::on(&root)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0..xmax, ymin..ymax)?;

    chart
        .configure_mesh()
        .x_labels(5)
        .y_labels(5)
        .y_label_formatter(&|x| format!("{:.2}", x))
        .x_label_formatter(&|x| format!("{:.0}", x))
        .x_desc("Distance from shore [m]")
        .y_desc("CH4 [µmol/l]")
        .draw()?;

    chart
        .draw_series(LineSeries::new(model, &BLACK))?
        .label("model")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &BLACK));

    chart
        .draw_series(PointSeries::of_element(points, 3, &GREEN, &|c, s, st| {
            EmptyElement::at(c) + Circle::new((0, 0), s, st.filled())
        }))?
        .label("observed")
        .legend(|(x, y)| Circle::new((x + 10, y), 3, GREEN.filled()));

    chart
        .configure_series_labels()
        .background_style(WHITE.filled())
        .border_style(&BLACK)
        .draw()?;
    Ok(())
}
