use ndarray::{concatenate, Array1, Array2, Axis};
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};

/// Read-only view of the search data: a dense training design matrix with its
/// response, and an optional held-out pair used for test-set scoring. Workers
/// share one `DataSet` by reference; nothing here is copied per thread.
pub struct DataSet {
    pub X: Array2<f64>, // samples x predictors
    pub y: Array1<f64>,
    pub X_test: Option<Array2<f64>>,
    pub y_test: Option<Array1<f64>>,
    pub features: Vec<String>,
    pub samples: Vec<String>,
}

impl DataSet {
    /// Wrap in-memory matrices, generating placeholder feature names.
    pub fn new(X: Array2<f64>, y: Array1<f64>) -> DataSet {
        let features = (1..=X.ncols()).map(|j| format!("x{}", j)).collect();
        let samples = (1..=X.nrows()).map(|i| format!("s{}", i)).collect();
        DataSet {
            X,
            y,
            X_test: None,
            y_test: None,
            features,
            samples,
        }
    }

    /// Attach a held-out set. Scoring with `performance: mse` then predicts
    /// on these matrices instead of the training data.
    pub fn set_test(&mut self, X_test: Array2<f64>, y_test: Array1<f64>) {
        self.X_test = Some(X_test);
        self.y_test = Some(y_test);
    }

    pub fn no_test_set(&self) -> bool {
        self.X_test.is_none()
    }

    /// The matrix predictions are evaluated on: the held-out set when one was
    /// supplied, the training set otherwise.
    pub fn x_eval(&self) -> &Array2<f64> {
        self.X_test.as_ref().unwrap_or(&self.X)
    }

    pub fn y_eval(&self) -> &Array1<f64> {
        self.y_test.as_ref().unwrap_or(&self.y)
    }

    /// Prepend a constant column of ones (and shift feature names). The
    /// intercept column must be in place before the search starts so that
    /// every fitted subset can include it as column 0.
    pub fn add_intercept_column(&mut self) {
        let ones = Array2::<f64>::ones((self.X.nrows(), 1));
        self.X = concatenate![Axis(1), ones, self.X];
        if let Some(X_test) = self.X_test.take() {
            let ones = Array2::<f64>::ones((X_test.nrows(), 1));
            self.X_test = Some(concatenate![Axis(1), ones, X_test]);
        }
        self.features.insert(0, "(Intercept)".to_string());
    }

    /// Load data from `X.tsv` and `y.tsv` files.
    ///
    /// `X.tsv`: one header line (`sample` followed by feature names), then one
    /// line per sample with its name and values. `y.tsv`: a header line, then
    /// `sample<TAB>value` rows in any order; responses are matched to the
    /// sample order of `X.tsv` by name.
    pub fn load_data(X_path: &str, y_path: &str) -> Result<DataSet, Box<dyn Error>> {
        let file_X = File::open(X_path)?;
        let mut reader_X = BufReader::new(file_X);

        // Read the first line to get feature names
        let mut first_line = String::new();
        reader_X.read_line(&mut first_line)?;
        let features: Vec<String> = trim_newline(&first_line)
            .split('\t')
            .skip(1)
            .map(String::from)
            .collect();

        let mut samples = Vec::new();
        let mut values: Vec<f64> = Vec::new();
        for line in reader_X.lines() {
            let line = line?;
            let trimmed_line = trim_newline(&line);
            if trimmed_line.is_empty() {
                continue;
            }
            let mut fields = trimmed_line.split('\t');

            // First field is the sample name
            if let Some(sample_name) = fields.next() {
                samples.push(sample_name.to_string());
            }

            let mut row_len = 0;
            for value in fields {
                values.push(value.parse::<f64>()?);
                row_len += 1;
            }
            if row_len != features.len() {
                return Err(format!(
                    "sample {} has {} values but {} features are declared",
                    samples.last().unwrap(),
                    row_len,
                    features.len()
                )
                .into());
            }
        }

        let X = Array2::from_shape_vec((samples.len(), features.len()), values)?;

        // Parse y.tsv and store responses keyed by sample name
        let file_y = File::open(y_path)?;
        let reader_y = BufReader::new(file_y);

        let mut y_map = HashMap::new();
        for line in reader_y.lines().skip(1) {
            let line = line?;
            let trimmed_line = trim_newline(&line);
            if trimmed_line.is_empty() {
                continue;
            }
            let mut fields = trimmed_line.split('\t');

            if let Some(sample_name) = fields.next() {
                if let Some(value) = fields.next() {
                    y_map.insert(sample_name.to_string(), value.parse::<f64>()?);
                }
            }
        }

        // Reorder `y` to match the sample order of X.tsv
        let y = samples
            .iter()
            .map(|sample_name| {
                y_map
                    .get(sample_name)
                    .copied()
                    .ok_or_else(|| format!("no response found for sample {}", sample_name))
            })
            .collect::<Result<Vec<f64>, String>>()?;

        Ok(DataSet {
            X,
            y: Array1::from_vec(y),
            X_test: None,
            y_test: None,
            features,
            samples,
        })
    }
}

fn trim_newline(line: &str) -> &str {
    line.strip_suffix('\n')
        .or_else(|| line.strip_suffix("\r\n"))
        .unwrap_or(line)
}

impl fmt::Display for DataSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "X: {} samples x {} predictors{}",
            self.X.nrows(),
            self.X.ncols(),
            if self.no_test_set() {
                "".to_string()
            } else {
                format!(
                    " (+ test set of {} samples)",
                    self.X_test.as_ref().unwrap().nrows()
                )
            }
        )?;

        let header = self.features.join("\t");
        let truncated_header = if header.len() > 100 {
            format!("{}...", &header[..97])
        } else {
            header
        };
        writeln!(f, "{:<12} {}", "", truncated_header)?;

        // Limit to the first 10 samples
        for i in (0..self.X.nrows()).take(10) {
            let row_display: String = self
                .X
                .row(i)
                .iter()
                .map(|v| format!("{:.2}", v))
                .collect::<Vec<_>>()
                .join("\t");
            let truncated_row = if row_display.len() > 80 {
                format!("{}...", &row_display[..77])
            } else {
                row_display
            };
            writeln!(f, "{:<12} {}", self.samples[i], truncated_row)?;
        }

        writeln!(f, "y:")?;
        for (i, value) in self.y.iter().take(10).enumerate() {
            writeln!(f, "{}\t{}", self.samples[i], value)?;
        }

        Ok(())
    }
}

impl fmt::Debug for DataSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Reuse the Display formatter
        write!(f, "{}", self)
    }
}
