use log::trace;
use rand::RngCore;

use crate::activation::activation::ActivationFunction;
use crate::error::{Error, Result};
use crate::layers::layer::{check_input, Layer, LayerKind, ParameterizedLayer};
use crate::layers::params::ParameterSet;
use crate::math::init::he_normal;
use crate::math::tensor::Tensor;

const FORGET: usize = 0;
const INPUT: usize = 1;
const CANDIDATE: usize = 2;
const OUTPUT: usize = 3;
const HEAD: usize = 4;
const GATES: [usize; 4] = [FORGET, INPUT, CANDIDATE, OUTPUT];

/// Values remembered from one time step for backpropagation through time.
#[derive(Debug, Clone)]
struct StepCache {
    /// `[x_t; h_{t-1}]`
    joined: Tensor,
    /// Post-activation gate values, indexed by the gate constants.
    gates: [Tensor; 4],
    previous_cell: Tensor,
    cell: Tensor,
}

/// Sequence-to-one LSTM.
///
/// The flat input holds `sequence_length` steps of `features` values. Each
/// step joins `x_t` with the previous hidden state and feeds four gates
/// (forget, input, candidate, output), each a `(hidden, features + hidden)`
/// matrix plus bias. The hidden and cell states start at zero. The final
/// hidden state goes through a dense head of width `output_size`.
///
/// Weights and biases are stored in the order forget, input, candidate,
/// output, head.
#[derive(Debug)]
pub struct LstmLayer {
    features: usize,
    hidden_units: usize,
    sequence_length: usize,
    output_size: usize,
    params: ParameterSet,
    steps: Option<Vec<StepCache>>,
}

impl LstmLayer {
    pub fn new(
        features: usize,
        hidden_units: usize,
        sequence_length: usize,
        output_size: usize,
    ) -> Result<LstmLayer> {
        if features == 0 || hidden_units == 0 || sequence_length == 0 || output_size == 0 {
            return Err(Error::InvalidConfig(format!(
                "lstm needs positive sizes, got features {features}, hidden {hidden_units}, \
                 sequence {sequence_length}, output {output_size}"
            )));
        }
        trace!("lstm {sequence_length}x{features} hidden {hidden_units} -> {output_size}");

        let joined = features + hidden_units;
        let mut weights: Vec<Tensor> = GATES
            .iter()
            .map(|_| Tensor::new(hidden_units, joined, 1))
            .collect();
        weights.push(Tensor::new(output_size, hidden_units, 1));
        let mut biases: Vec<Tensor> = GATES.iter().map(|_| Tensor::new(hidden_units, 1, 1)).collect();
        biases.push(Tensor::new(output_size, 1, 1));

        let mut layer = LstmLayer {
            features,
            hidden_units,
            sequence_length,
            output_size,
            params: ParameterSet::new(weights, biases),
            steps: None,
        };
        layer.initialize_parameters(&mut rand::thread_rng());
        Ok(layer)
    }

    pub fn hidden_units(&self) -> usize {
        self.hidden_units
    }

    pub fn sequence_length(&self) -> usize {
        self.sequence_length
    }

    fn affine(&self, index: usize, x: &Tensor) -> Result<Tensor> {
        x.matmul(&self.params.weights()[index])?
            .try_add(&self.params.biases()[index])
    }
}

impl Layer for LstmLayer {
    fn kind(&self) -> LayerKind {
        LayerKind::Lstm
    }

    fn input_size(&self) -> Option<usize> {
        Some(self.features * self.sequence_length)
    }

    fn output_size(&self) -> Option<usize> {
        Some(self.output_size)
    }

    fn forward(&mut self, input: &Tensor) -> Result<Tensor> {
        check_input(self.kind(), self.features * self.sequence_length, input)?;
        let sigmoid = ActivationFunction::Sigmoid;

        let mut hidden = Tensor::new(self.hidden_units, 1, 1);
        let mut cell = Tensor::new(self.hidden_units, 1, 1);
        let mut steps = Vec::with_capacity(self.sequence_length);

        for t in 0..self.sequence_length {
            let x = input.segment(t * self.features, self.features)?;
            let joined = Tensor::concat(&[x, hidden]);

            let forget = self.affine(FORGET, &joined)?.map(|v| sigmoid.function(v));
            let input_gate = self.affine(INPUT, &joined)?.map(|v| sigmoid.function(v));
            let candidate = self.affine(CANDIDATE, &joined)?.map(f64::tanh);
            let output = self.affine(OUTPUT, &joined)?.map(|v| sigmoid.function(v));

            let next_cell = forget.hadamard(&cell)?.try_add(&input_gate.hadamard(&candidate)?)?;
            hidden = output.hadamard(&next_cell.map(f64::tanh))?;

            steps.push(StepCache {
                joined,
                gates: [forget, input_gate, candidate, output],
                previous_cell: cell,
                cell: next_cell.clone(),
            });
            cell = next_cell;
        }

        let out = self.affine(HEAD, &hidden)?;
        self.steps = Some(steps);
        Ok(out)
    }

    fn backward(&mut self, output_gradient: &Tensor) -> Result<Tensor> {
        check_input(self.kind(), self.output_size, output_gradient)?;
        let steps = self
            .steps
            .as_ref()
            .ok_or(Error::BackwardBeforeForward(LayerKind::Lstm.name()))?;
        let dy = output_gradient.flatten();

        // head
        let last = &steps[steps.len() - 1];
        let last_hidden = last.gates[OUTPUT].hadamard(&last.cell.map(f64::tanh))?;
        self.params.accumulate_weight(HEAD, &last_hidden.transpose().matmul(&dy)?)?;
        self.params.accumulate_bias(HEAD, &dy)?;
        let mut dh = dy.matmul(&self.params.weights()[HEAD].transpose())?;
        let mut dc = Tensor::new(self.hidden_units, 1, 1);

        let mut input_gradients = vec![Tensor::new(self.features, 1, 1); self.sequence_length];
        for (t, step) in steps.iter().enumerate().rev() {
            let [forget, input_gate, candidate, output] = &step.gates;
            let tanh_cell = step.cell.map(f64::tanh);

            let d_output = dh.hadamard(&tanh_cell)?;
            let through_tanh = tanh_cell.map(|v| 1.0 - v * v);
            dc = dc.try_add(&dh.hadamard(output)?.hadamard(&through_tanh)?)?;

            let d_forget = dc.hadamard(&step.previous_cell)?;
            let d_input = dc.hadamard(candidate)?;
            let d_candidate = dc.hadamard(input_gate)?;

            // pre-activation gradients
            let pre = [
                d_forget.hadamard(&forget.map(|s| s * (1.0 - s)))?,
                d_input.hadamard(&input_gate.map(|s| s * (1.0 - s)))?,
                d_candidate.hadamard(&candidate.map(|c| 1.0 - c * c))?,
                d_output.hadamard(&output.map(|s| s * (1.0 - s)))?,
            ];

            let mut d_joined = Tensor::new(self.features + self.hidden_units, 1, 1);
            let joined_t = step.joined.transpose();
            for (gate, delta) in GATES.iter().zip(&pre) {
                self.params.accumulate_weight(*gate, &joined_t.matmul(delta)?)?;
                self.params.accumulate_bias(*gate, delta)?;
                d_joined.add_scaled(&delta.matmul(&self.params.weights()[*gate].transpose())?, 1.0)?;
            }

            input_gradients[t] = d_joined.segment(0, self.features)?;
            dh = d_joined.segment(self.features, self.hidden_units)?;
            dc = dc.hadamard(forget)?;
        }

        Ok(Tensor::concat(&input_gradients))
    }

    fn as_parameterized(&self) -> Option<&dyn ParameterizedLayer> {
        Some(self)
    }

    fn as_parameterized_mut(&mut self) -> Option<&mut dyn ParameterizedLayer> {
        Some(self)
    }
}

impl ParameterizedLayer for LstmLayer {
    fn parameters(&self) -> &ParameterSet {
        &self.params
    }

    fn parameters_mut(&mut self) -> &mut ParameterSet {
        &mut self.params
    }

    fn initialize_parameters(&mut self, rng: &mut dyn RngCore) {
        let joined = self.features + self.hidden_units;
        let (hidden, output) = (self.hidden_units, self.output_size);
        let weights = self.params.weights_mut();
        for gate in GATES {
            weights[gate] = he_normal([hidden, joined, 1], joined, rng);
        }
        weights[HEAD] = he_normal([output, hidden, 1], hidden, rng);
        self.params.biases_mut().iter_mut().for_each(|b| b.fill(0.0));
        self.params.reset_state();
    }
}
