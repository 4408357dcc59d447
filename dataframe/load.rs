use super::*;
use anyhow::Result;
use fnv::FnvHashSet;
use std::collections::BTreeMap;
use std::num::NonZeroUsize;

#[derive(Clone)]
pub struct FromCsvOptions<'a> {
	/// Pre-declared types for columns whose type should not be inferred.
	pub column_types: Option<BTreeMap<String, ColumnType>>,
	pub infer_options: InferOptions,
	pub invalid_values: &'a [&'a str],
}

impl<'a> Default for FromCsvOptions<'a> {
	fn default() -> Self {
		Self {
			column_types: None,
			infer_options: InferOptions::default(),
			invalid_values: DEFAULT_INVALID_VALUES,
		}
	}
}

#[derive(Clone, Debug)]
pub struct InferOptions {
	/// A column with more than this many distinct non-numeric values is inferred as text rather than enum.
	pub enum_max_unique_values: usize,
}

impl Default for InferOptions {
	fn default() -> Self {
		Self {
			enum_max_unique_values: 100,
		}
	}
}

/// These values are considered missing. They are retained as explicit missing markers (NaN for number columns, `None` for enum columns), never silently dropped.
pub const DEFAULT_INVALID_VALUES: &[&str] = &[
	"", "null", "NULL", "n/a", "N/A", "nan", "-nan", "NaN", "-NaN", "?",
];

impl DataFrame {
	pub fn from_csv<R>(
		reader: &mut csv::Reader<R>,
		options: FromCsvOptions,
		progress: impl Fn(u64),
	) -> Result<Self>
	where
		R: std::io::Read + std::io::Seek,
	{
		let column_names: Vec<String> = reader
			.headers()?
			.into_iter()
			.map(|column_name| column_name.to_owned())
			.collect();
		let n_columns = column_names.len();
		let start_position = reader.position().clone();
		let infer_options = &options.infer_options;

		#[derive(Clone, Debug)]
		enum ColumnTypeOrInferStats<'a> {
			ColumnType(ColumnType),
			InferStats(InferStats<'a>),
		}

		// Retrieve any column types present in the options.
		let mut column_types: Vec<ColumnTypeOrInferStats> =
			if let Some(column_types) = options.column_types {
				column_names
					.iter()
					.map(|column_name| {
						column_types
							.get(column_name)
							.map(|column_type| {
								ColumnTypeOrInferStats::ColumnType(column_type.clone())
							})
							.unwrap_or_else(|| {
								ColumnTypeOrInferStats::InferStats(InferStats::new(infer_options))
							})
					})
					.collect()
			} else {
				vec![ColumnTypeOrInferStats::InferStats(InferStats::new(infer_options)); n_columns]
			};

		// Passing over the csv to infer column types is only necessary if one or more columns did not have its type specified.
		let needs_infer = column_types
			.iter()
			.any(|column_type| matches!(column_type, ColumnTypeOrInferStats::InferStats(_)));

		let mut n_rows = None;
		let column_types: Vec<ColumnType> = if needs_infer {
			let mut infer_stats: Vec<(usize, &mut InferStats)> = column_types
				.iter_mut()
				.enumerate()
				.filter_map(|(index, column_type)| match column_type {
					ColumnTypeOrInferStats::ColumnType(_) => None,
					ColumnTypeOrInferStats::InferStats(infer_stats) => Some((index, infer_stats)),
				})
				.collect();
			// Iterate over each record in the csv file and update the infer stats for the columns that need to be inferred.
			let mut record = csv::StringRecord::new();
			let mut n_rows_computed = 0;
			while reader.read_record(&mut record)? {
				n_rows_computed += 1;
				for (index, infer_stats) in infer_stats.iter_mut() {
					let value = record.get(*index).unwrap_or("");
					infer_stats.update(value);
				}
			}
			n_rows = Some(n_rows_computed);
			let column_types = column_types
				.into_iter()
				.map(|column_type| match column_type {
					ColumnTypeOrInferStats::ColumnType(column_type) => column_type,
					ColumnTypeOrInferStats::InferStats(infer_stats) => infer_stats.finalize(),
				})
				.collect();
			// After inference, return back to the beginning of the csv to load the values.
			reader.seek(start_position)?;
			column_types
		} else {
			column_types
				.into_iter()
				.map(|column_type| match column_type {
					ColumnTypeOrInferStats::ColumnType(column_type) => column_type,
					_ => unreachable!(),
				})
				.collect()
		};

		// Create the dataframe and reserve storage if the inference pass counted the rows.
		let mut dataframe = Self::new(column_names, column_types);
		if let Some(n_rows) = n_rows {
			for column in dataframe.columns.iter_mut() {
				match column {
					Column::Unknown(_) => {}
					Column::Number(column) => column.data.reserve_exact(n_rows),
					Column::Enum(column) => column.data.reserve_exact(n_rows),
					Column::Text(column) => column.data.reserve_exact(n_rows),
				}
			}
		}

		// Read each csv record and insert the values into the columns of the dataframe.
		let mut record = csv::StringRecord::new();
		while reader.read_record(&mut record)? {
			if let Some(position) = record.position() {
				progress(position.byte());
			}
			for (index, column) in dataframe.columns.iter_mut().enumerate() {
				let value = record.get(index).unwrap_or("");
				match column {
					Column::Unknown(column) => {
						column.len += 1;
					}
					Column::Number(column) => {
						let value = if options.invalid_values.contains(&value) {
							std::f32::NAN
						} else {
							match lexical::parse::<f32, &str>(value) {
								Ok(value) if value.is_finite() => value,
								_ => std::f32::NAN,
							}
						};
						column.data.push(value);
					}
					Column::Enum(column) => {
						let value = column.value_for_option(value);
						column.data.push(value);
					}
					Column::Text(column) => {
						column.data.push(value.to_owned());
					}
				}
			}
		}
		Ok(dataframe)
	}
}

#[derive(Clone, Debug)]
pub struct InferStats<'a> {
	infer_options: &'a InferOptions,
	column_type: InferColumnType,
	/// The distinct non-missing values observed so far, in first-seen order. This becomes `None` once the count exceeds `enum_max_unique_values`.
	unique_values: Option<Vec<String>>,
	seen: FnvHashSet<String>,
}

#[derive(PartialEq, Clone, Copy, Debug)]
enum InferColumnType {
	Unknown,
	Number,
	Enum,
	Text,
}

impl<'a> InferStats<'a> {
	pub fn new(infer_options: &'a InferOptions) -> Self {
		Self {
			infer_options,
			column_type: InferColumnType::Unknown,
			unique_values: Some(Vec::new()),
			seen: FnvHashSet::default(),
		}
	}

	pub fn update(&mut self, value: &str) {
		if DEFAULT_INVALID_VALUES.contains(&value) {
			return;
		}
		if let Some(unique_values) = self.unique_values.as_mut() {
			if !self.seen.contains(value) {
				self.seen.insert(value.to_owned());
				unique_values.push(value.to_owned());
			}
			if unique_values.len() > self.infer_options.enum_max_unique_values {
				self.unique_values = None;
				self.seen.clear();
			}
		}
		match self.column_type {
			InferColumnType::Unknown | InferColumnType::Number => {
				if lexical::parse::<f32, &str>(value)
					.map(|value| value.is_finite())
					.unwrap_or(false)
				{
					self.column_type = InferColumnType::Number;
				} else if self.unique_values.is_some() {
					self.column_type = InferColumnType::Enum;
				} else {
					self.column_type = InferColumnType::Text;
				}
			}
			InferColumnType::Enum => {
				if self.unique_values.is_none() {
					self.column_type = InferColumnType::Text;
				}
			}
			_ => {}
		}
	}

	pub fn finalize(self) -> ColumnType {
		match self.column_type {
			InferColumnType::Unknown => ColumnType::Unknown,
			InferColumnType::Number => {
				// If all the values in a number column are zero or one then make this an enum column instead, so binary label columns get class semantics.
				if let Some(unique_values) = self.unique_values {
					let all_zero_or_one = unique_values
						.iter()
						.all(|value| value == "0" || value == "1");
					if unique_values.len() == 2 && all_zero_or_one {
						return ColumnType::Enum {
							options: unique_values,
						};
					}
				}
				ColumnType::Number
			}
			InferColumnType::Enum => ColumnType::Enum {
				options: self.unique_values.unwrap(),
			},
			InferColumnType::Text => ColumnType::Text,
		}
	}
}

#[test]
fn test_infer() {
	let csv = "number,enum,text\n3,married,hello\n1,single,world\n2,married,again\n";
	let dataframe = DataFrame::from_csv(
		&mut csv::Reader::from_reader(std::io::Cursor::new(csv)),
		FromCsvOptions {
			infer_options: InferOptions {
				enum_max_unique_values: 2,
			},
			..Default::default()
		},
		|_| {},
	)
	.unwrap();
	assert_eq!(dataframe.nrows(), 3);
	assert_eq!(dataframe.ncols(), 3);
	let number = dataframe.columns[0].as_number().unwrap();
	assert_eq!(number.data, vec![3.0, 1.0, 2.0]);
	// Enum options are collected in first-seen order.
	let enum_column = dataframe.columns[1].as_enum().unwrap();
	assert_eq!(enum_column.options, vec!["married", "single"]);
	assert_eq!(
		enum_column.data,
		vec![
			NonZeroUsize::new(1),
			NonZeroUsize::new(2),
			NonZeroUsize::new(1),
		]
	);
	// The text column exceeded the enum unique value limit.
	let text_column = dataframe.columns[2].as_text().unwrap();
	assert_eq!(text_column.data, vec!["hello", "world", "again"]);
}

#[test]
fn test_missing_values_are_retained() {
	let csv = "income,gender\n1000,Male\n,Female\nn/a,\n2000,Male\n";
	let dataframe = DataFrame::from_csv(
		&mut csv::Reader::from_reader(std::io::Cursor::new(csv)),
		FromCsvOptions::default(),
		|_| {},
	)
	.unwrap();
	let income = dataframe.columns[0].as_number().unwrap();
	assert_eq!(income.data.len(), 4);
	assert!(income.data[1].is_nan());
	assert!(income.data[2].is_nan());
	let gender = dataframe.columns[1].as_enum().unwrap();
	assert_eq!(gender.options, vec!["Male", "Female"]);
	assert_eq!(gender.data[2], None);
}

#[test]
fn test_zero_one_column_becomes_enum() {
	let csv = "approved\n0\n1\n0\n";
	let dataframe = DataFrame::from_csv(
		&mut csv::Reader::from_reader(std::io::Cursor::new(csv)),
		FromCsvOptions::default(),
		|_| {},
	)
	.unwrap();
	let column = dataframe.columns[0].as_enum().unwrap();
	assert_eq!(column.options, vec!["0", "1"]);
}

#[test]
fn test_declared_column_types() {
	let csv = "code,label\n1,yes\n2,no\n";
	let mut column_types = BTreeMap::new();
	column_types.insert(
		"code".to_owned(),
		ColumnType::Enum {
			options: vec!["1".to_owned(), "2".to_owned()],
		},
	);
	let dataframe = DataFrame::from_csv(
		&mut csv::Reader::from_reader(std::io::Cursor::new(csv)),
		FromCsvOptions {
			column_types: Some(column_types),
			..Default::default()
		},
		|_| {},
	)
	.unwrap();
	let code = dataframe.columns[0].as_enum().unwrap();
	assert_eq!(code.data, vec![NonZeroUsize::new(1), NonZeroUsize::new(2)]);
	assert!(dataframe.columns[1].as_enum().is_some());
}
