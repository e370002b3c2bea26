// PNG charts - Render the dashboard series to image files
use crate::config::Config;
use crate::view::{Charts, Series};
use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use plotters::coord::Shift;
use plotters::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

const TITLE_FONT_SIZE: u32 = 40;
const LABEL_CHARS: usize = 28;

pub struct ChartRenderer {
    output_dir: PathBuf,
    width: u32,
    height: u32,
    show_progress: bool,
}

type Area<'a> = DrawingArea<BitMapBackend<'a>, Shift>;

impl ChartRenderer {
    pub fn new(output_dir: PathBuf, config: &Config) -> Self {
        Self {
            output_dir,
            width: config.chart_width,
            height: config.chart_height,
            show_progress: true,
        }
    }

    pub fn without_progress(mut self) -> Self {
        self.show_progress = false;
        self
    }

    /// Render every chart; individual failures are logged and skipped
    pub fn render_all(&self, charts: &Charts) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(&self.output_dir)?;

        let jobs: [(&str, &dyn Fn(&Path) -> Result<()>); 4] = [
            ("trend.png", &|p| self.trend(p, &charts.timeline)),
            ("test_items.png", &|p| {
                self.vertical_bars(p, "Top Test Items (Fails)", &charts.test_items)
            }),
            ("top_errors.png", &|p| {
                self.horizontal_bars(p, "Top Errors", &charts.top_errors)
            }),
            ("results.png", &|p| {
                self.vertical_bars(p, "Result Distribution", &charts.result_pie)
            }),
        ];

        let pb = if self.show_progress {
            let pb = ProgressBar::new(jobs.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("[{elapsed}] {bar:40.green/blue} {pos}/{len} charts {msg}")?
                    .progress_chars("█▓▒░"),
            );
            Some(pb)
        } else {
            None
        };

        let mut generated = Vec::new();
        for (name, render) in jobs {
            if let Some(ref pb) = pb {
                pb.set_message(name);
            }
            let path = self.output_dir.join(name);
            match render(&path) {
                Ok(()) => generated.push(path),
                Err(e) => warn!("Skipping {}: {}", name, e),
            }
            if let Some(ref pb) = pb {
                pb.inc(1);
            }
        }

        if let Some(pb) = pb {
            pb.finish_with_message("Complete!");
        }
        Ok(generated)
    }

    fn canvas<'a>(&self, path: &'a Path) -> Result<Area<'a>> {
        let root = BitMapBackend::new(path, (self.width, self.height)).into_drawing_area();
        root.fill(&WHITE)?;
        Ok(root)
    }

    fn no_data(&self, root: &Area, title: &str) -> Result<()> {
        root.draw_text(
            &format!("{}: No data", title),
            &TextStyle::from(("sans-serif", TITLE_FONT_SIZE).into_font())
                .color(&RGBColor(120, 120, 120)),
            (self.width as i32 / 3, self.height as i32 / 2),
        )?;
        root.present()?;
        Ok(())
    }

    /// Daily failure counts as a line with markers
    fn trend(&self, path: &Path, series: &Series) -> Result<()> {
        let title = "Trend Failure";
        let root = self.canvas(path)?;
        if series.is_empty() {
            return self.no_data(&root, title);
        }

        let max = series.max() + 1;
        let mut chart = ChartBuilder::on(&root)
            .caption(title, ("sans-serif", TITLE_FONT_SIZE).into_font())
            .margin(20)
            .x_label_area_size(60)
            .y_label_area_size(60)
            .build_cartesian_2d(0..series.len(), 0..max)?;

        chart
            .configure_mesh()
            .x_labels(series.len().min(12))
            .x_label_formatter(&|x| series.labels.get(*x).cloned().unwrap_or_default())
            .y_desc("Fails")
            .draw()?;

        let points: Vec<(usize, u64)> = series.values.iter().copied().enumerate().collect();
        chart.draw_series(LineSeries::new(points.iter().copied(), &RED))?;
        chart.draw_series(PointSeries::of_element(
            points.iter().copied(),
            5,
            &RED,
            &|c, s, st| EmptyElement::at(c) + Circle::new((0, 0), s, st.filled()),
        ))?;

        root.present()?;
        Ok(())
    }

    fn vertical_bars(&self, path: &Path, title: &str, series: &Series) -> Result<()> {
        let root = self.canvas(path)?;
        if series.is_empty() {
            return self.no_data(&root, title);
        }

        let max = series.max() + 1;
        let mut chart = ChartBuilder::on(&root)
            .caption(title, ("sans-serif", TITLE_FONT_SIZE).into_font())
            .margin(20)
            .x_label_area_size(150)
            .y_label_area_size(60)
            .build_cartesian_2d(0..(series.len() as i32), 0..max)?;

        chart
            .configure_mesh()
            .x_labels(series.len())
            .x_label_formatter(&|x: &i32| label_at(series, *x))
            .draw()?;

        chart.draw_series(series.values.iter().enumerate().map(|(i, &count)| {
            let color = Palette99::pick(i).mix(0.9);
            Rectangle::new([(i as i32, 0), (i as i32 + 1, count)], color.filled())
        }))?;

        root.present()?;
        Ok(())
    }

    /// Largest bucket on top
    fn horizontal_bars(&self, path: &Path, title: &str, series: &Series) -> Result<()> {
        let root = self.canvas(path)?;
        if series.is_empty() {
            return self.no_data(&root, title);
        }

        let n = series.len() as i32;
        let max = series.max() + 1;
        let mut chart = ChartBuilder::on(&root)
            .caption(title, ("sans-serif", TITLE_FONT_SIZE).into_font())
            .margin(20)
            .x_label_area_size(60)
            .y_label_area_size(320)
            .build_cartesian_2d(0..max, 0..n)?;

        chart
            .configure_mesh()
            .y_labels(series.len())
            .y_label_formatter(&|y: &i32| label_at(series, n - 1 - *y))
            .x_desc("Fails")
            .draw()?;

        chart.draw_series(series.values.iter().enumerate().map(|(i, &count)| {
            let row = n - 1 - i as i32;
            let color = Palette99::pick(i).mix(0.9);
            Rectangle::new([(0, row), (count, row + 1)], color.filled())
        }))?;

        root.present()?;
        Ok(())
    }
}

fn label_at(series: &Series, idx: i32) -> String {
    usize::try_from(idx)
        .ok()
        .and_then(|i| series.labels.get(i))
        .map(|l| l.chars().take(LABEL_CHARS).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn series() -> Series {
        Series {
            labels: vec!["first".into(), "x".repeat(40)],
            values: vec![3, 1],
            texts: Vec::new(),
        }
    }

    #[test]
    fn test_label_at() {
        let s = series();
        assert_eq!(label_at(&s, 0), "first");
        assert_eq!(label_at(&s, 1).chars().count(), LABEL_CHARS);
        assert_eq!(label_at(&s, 2), "");
        assert_eq!(label_at(&s, -1), "");
    }

    #[test]
    fn test_render_all_creates_output_dir() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("charts");
        let renderer = ChartRenderer::new(out.clone(), &Config::default()).without_progress();
        let generated = renderer.render_all(&Charts::default()).unwrap();
        assert!(out.is_dir());
        assert!(generated.len() <= 4);
        for path in generated {
            assert!(path.starts_with(&out));
        }
    }
}
