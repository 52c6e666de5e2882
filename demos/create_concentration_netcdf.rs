//! Creates a sample concentration time series for trying out the ncjson server.
//!
//! The file has the layout the `/get-data` and `/get-image-inputs` routes
//! expect: `concentration(time, z, y, x)` plus `time`, `x` and `y` axes.

use ndarray::{Array1, Array4};
use netcdf::create;
use std::path::Path;

const NT: usize = 6;
const NZ: usize = 3;
const NY: usize = 40;
const NX: usize = 60;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let output_path = Path::new("concentration.timeseries.nc");

    println!("Creating sample NetCDF file: {}", output_path.display());

    if output_path.exists() {
        std::fs::remove_file(output_path)?
    }

    let mut file = create(output_path)?;

    file.add_attribute("title", "Tracer plume dispersion")?;
    file.add_attribute("source", "create_concentration_netcdf.rs")?;
    file.add_attribute("history", vec!["generated\nby the ncjson demo".to_string()])?;

    file.add_dimension("time", NT)?;
    file.add_dimension("z", NZ)?;
    file.add_dimension("y", NY)?;
    file.add_dimension("x", NX)?;

    {
        let mut time_var = file.add_variable::<f64>("time", &["time"])?;
        time_var.put_attribute("units", "seconds since 2024-01-01 00:00:00")?;
        time_var.put_attribute("long_name", "time")?;
        let time: Vec<f64> = (0..NT).map(|i| i as f64 * 600.0).collect();
        time_var.put(Array1::from(time).view(), ..)?;
    }

    {
        let mut z_var = file.add_variable::<f32>("z", &["z"])?;
        z_var.put_attribute("units", "m")?;
        z_var.put_attribute("positive", "up")?;
        z_var.put(Array1::from(vec![2.0f32, 50.0, 200.0]).view(), ..)?;
    }

    {
        let mut y_var = file.add_variable::<f64>("y", &["y"])?;
        y_var.put_attribute("units", "m")?;
        let y: Vec<f64> = (0..NY).map(|j| j as f64 * 25.0).collect();
        y_var.put(Array1::from(y).view(), ..)?;
    }

    {
        let mut x_var = file.add_variable::<f64>("x", &["x"])?;
        x_var.put_attribute("units", "m")?;
        let x: Vec<f64> = (0..NX).map(|i| i as f64 * 25.0).collect();
        x_var.put(Array1::from(x).view(), ..)?;
    }

    {
        let mut conc_var = file.add_variable::<f32>("concentration", &["time", "z", "y", "x"])?;
        conc_var.put_attribute("units", "ug m-3")?;
        conc_var.put_attribute("long_name", "tracer concentration")?;
        conc_var.put_attribute("_FillValue", -999.0f32)?;

        // A Gaussian puff drifting along x and spreading with time and height.
        let mut field = Vec::with_capacity(NT * NZ * NY * NX);
        for t in 0..NT {
            let cx = 10.0 + 7.0 * t as f32;
            let cy = NY as f32 / 2.0;
            for k in 0..NZ {
                let sigma = 3.0 + t as f32 + 2.0 * k as f32;
                let peak = 100.0 / (1.0 + k as f32);
                for j in 0..NY {
                    for i in 0..NX {
                        let dx = i as f32 - cx;
                        let dy = j as f32 - cy;
                        field.push(peak * (-(dx * dx + dy * dy) / (2.0 * sigma * sigma)).exp());
                    }
                }
            }
        }
        let data = Array4::from_shape_vec((NT, NZ, NY, NX), field)?;
        conc_var.put(data.view(), ..)?;
    }

    println!("Created sample NetCDF file with:");
    println!("   Dimensions: time({}), z({}), y({}), x({})", NT, NZ, NY, NX);
    println!("   Variables: time, z, y, x, concentration");
    println!("\nServe it with:");
    println!("   cargo run -- --file {}", output_path.display());

    Ok(())
}
