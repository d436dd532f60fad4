use mnist_sgd::tensor::*;

#[test]
fn test_from_vec() {
    let tensor1 = RcTensor::from(vec![vec![0, 1, 2], vec![3, 4, 5]]);
    let tensor2 = RcTensor::new((0..6).collect(), vec![2, 3]).unwrap();
    assert_eq!(tensor1, tensor2);
}

#[test]
fn test_new_with_filler() {
    let vec = RcTensor::new_with_filler(vec![4], 4);
    assert_eq!(vec.shape(), &[4]);
    assert_eq!(vec.get(&[0]).unwrap(), &4);
}

#[test]
fn test_new_rejects_wrong_length() {
    assert_eq!(
        RcTensor::new(vec![1, 2, 3], vec![2, 2]),
        Err(TensorError::InvalidLength {
            len: 3,
            shape: vec![2, 2]
        })
    );
}

#[test]
fn test_get_2x2x2() {
    let matrix = RcTensor::new(vec![0, 1, 2, 3, 4, 5, 6, 7], vec![2, 2, 2]).unwrap();
    assert_eq!(*matrix.get(&[0, 0, 0]).unwrap(), 0);
    assert_eq!(*matrix.get(&[0, 1, 0]).unwrap(), 2);
    assert_eq!(*matrix.get(&[1, 1, 1]).unwrap(), 7);
    assert!(matrix.get(&[2, 0, 0]).is_err());
}

#[test]
fn test_get_3x3() {
    let matrix = RcTensor::new((0..9).collect(), vec![3, 3]).unwrap();
    let mut prev = -1;
    for i in 0..3 {
        for j in 0..3 {
            let &curr = matrix.get(&[i, j]).unwrap();
            assert_eq!(prev + 1, curr);
            prev = curr;
        }
    }
}

#[test]
fn test_scalar_elem() {
    let scalar = RcTensor::scalar(2.5);
    assert!(scalar.is_scalar());
    assert_eq!(scalar.elem(), Ok(2.5));
    assert_eq!(
        RcTensor::from([1.0, 2.0]).elem(),
        Err(TensorError::NotAScalar(vec![2]))
    );
}

#[test]
fn test_linear_forward_and_backward() {
    let input = RcTensor::from([[1.0, 0.0, -1.0], [2.0, 1.0, 0.0]]);
    let weight = RcTensor::from([[1.0, 1.0, 1.0], [0.0, 2.0, 0.0]]).requires_grad_(true);
    let bias = RcTensor::from([0.0, 1.0]).requires_grad_(true);

    let output = functional::linear(&input, &weight, Some(&bias)).unwrap();
    assert_eq!(output, RcTensor::from([[0.0, 1.0], [3.0, 3.0]]));

    functional::sum(&output).backward().unwrap();
    assert_eq!(
        weight.grad(),
        Some(RcTensor::from([[3.0, 1.0, -1.0], [3.0, 1.0, -1.0]]))
    );
    assert_eq!(bias.grad(), Some(RcTensor::from([2.0, 2.0])));
}

#[test]
fn test_cross_entropy_gradient_rows_sum_to_zero() {
    let logits = RcTensor::from([[1.0, 2.0, 0.5], [0.0, -1.0, 3.0]]).requires_grad_(true);
    let targets = RcTensor::from([1i64, 2]);
    functional::cross_entropy(&logits, &targets)
        .unwrap()
        .backward()
        .unwrap();
    let grad = logits.grad().unwrap();
    for row in grad.as_slice().chunks(3) {
        approx::assert_abs_diff_eq!(row.iter().sum::<f64>(), 0.0, epsilon = 1e-12);
    }
    // the target entry is the only negative one
    assert!(grad.get(&[0, 1]).unwrap() < &0.0);
    assert!(grad.get(&[1, 2]).unwrap() < &0.0);
}

#[test]
fn test_cuda_is_never_selected() {
    assert!(!Device::cuda_is_available());
    assert_eq!(Device::cuda_if_available(), Device::Cpu);
    assert_eq!(
        RcTensor::from([1.0f32]).to(Device::Cuda(0)),
        Err(TensorError::DeviceUnavailable(Device::Cuda(0)))
    );
}
